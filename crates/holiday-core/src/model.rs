use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum HolidayType {
  Public,
  Bank,
  School,
  Authorities,
  Optional,
  Observance,
  Other(String)
}

impl HolidayType {
  pub fn as_str(&self) -> &str {
    match self {
      | Self::Public => "Public",
      | Self::Bank => "Bank",
      | Self::School => "School",
      | Self::Authorities => {
        "Authorities"
      }
      | Self::Optional => "Optional",
      | Self::Observance => "Observance",
      | Self::Other(raw) => raw.as_str()
    }
  }
}

impl From<String> for HolidayType {
  fn from(raw: String) -> Self {
    match raw.trim() {
      | "Public" => Self::Public,
      | "Bank" => Self::Bank,
      | "School" => Self::School,
      | "Authorities" => {
        Self::Authorities
      }
      | "Optional" => Self::Optional,
      | "Observance" => Self::Observance,
      | _ => Self::Other(raw)
    }
  }
}

impl From<HolidayType> for String {
  fn from(kind: HolidayType) -> Self {
    kind.as_str().to_string()
  }
}

impl fmt::Display for HolidayType {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolidayScope<'a> {
  National,
  Regional(&'a [String])
}

/// One public holiday as fetched for a
/// country. Immutable once built.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct HolidayRecord {
  pub date:           NaiveDate,
  pub name:           String,
  #[serde(default)]
  pub local_name:     Option<String>,
  #[serde(rename = "type")]
  pub kind:           HolidayType,
  pub global:         bool,
  #[serde(default)]
  pub subdivisions:   Option<Vec<String>>,
  #[serde(default)]
  pub observed_since: Option<i32>
}

impl HolidayRecord {
  pub fn scope(&self) -> HolidayScope<'_> {
    match self.subdivisions.as_deref() {
      | Some(subdivisions)
        if !subdivisions.is_empty() =>
      {
        HolidayScope::Regional(
          subdivisions
        )
      }
      | _ => HolidayScope::National
    }
  }

  pub fn matches_name(
    &self,
    lowered_query: &str
  ) -> bool {
    self
      .name
      .to_lowercase()
      .contains(lowered_query)
  }
}

/// Holidays of one (country, year), keyed
/// by date. Iteration is in date order.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct YearHolidayMap(
  BTreeMap<NaiveDate, HolidayRecord>
);

impl YearHolidayMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a map from records; when two
  /// records share a date a nationwide one
  /// is kept over a regional one, otherwise
  /// the later record wins.
  pub fn from_records<I>(
    records: I
  ) -> Self
  where
    I: IntoIterator<Item = HolidayRecord>
  {
    let mut map: BTreeMap<
      NaiveDate,
      HolidayRecord
    > = BTreeMap::new();
    for record in records {
      let keep_existing = map
        .get(&record.date)
        .is_some_and(|existing| {
          existing.global
            && !record.global
        });
      if !keep_existing {
        map.insert(record.date, record);
      }
    }
    Self(map)
  }

  pub fn get(
    &self,
    date: &NaiveDate
  ) -> Option<&HolidayRecord> {
    self.0.get(date)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = &HolidayRecord>
  {
    self.0.values()
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct Country {
  pub code: String,
  pub name: String
}

/// Holiday as returned by the remote API.
/// Both the v3 `types` array and the older
/// single `type` string are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiHoliday {
  date:        NaiveDate,
  #[serde(default)]
  local_name:  Option<String>,
  name:        String,
  #[serde(default)]
  global:      Option<bool>,
  #[serde(default)]
  counties:    Option<Vec<String>>,
  #[serde(default)]
  launch_year: Option<i32>,
  #[serde(default)]
  types:       Option<Vec<String>>,
  #[serde(default, rename = "type")]
  kind:        Option<String>
}

impl From<ApiHoliday> for HolidayRecord {
  fn from(raw: ApiHoliday) -> Self {
    let subdivisions = raw
      .counties
      .filter(|counties| {
        !counties.is_empty()
      });
    let kind = raw
      .types
      .and_then(|types| {
        types.into_iter().next()
      })
      .or(raw.kind)
      .map(HolidayType::from)
      .unwrap_or(HolidayType::Public);
    let global = raw
      .global
      .unwrap_or(subdivisions.is_none());

    Self {
      date: raw.date,
      name: raw.name,
      local_name: raw
        .local_name
        .filter(|name| {
          !name.trim().is_empty()
        }),
      kind,
      global,
      subdivisions,
      observed_since: raw.launch_year
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiCountry {
  country_code: String,
  name:         String
}

impl From<ApiCountry> for Country {
  fn from(raw: ApiCountry) -> Self {
    Self {
      code: raw.country_code,
      name: raw.name
    }
  }
}
