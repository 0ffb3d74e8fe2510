//! Error taxonomy for the fetch pipeline and
//! user input validation.

/// Failure while retrieving a remote resource.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  thiserror::Error,
)]
pub enum FetchError {
  /// Network unreachable, timeout or
  /// unreadable body.
  #[error("transport error: {0}")]
  Transport(String),

  /// Non-success status other than the
  /// documented empty-result codes.
  #[error("HTTP error! status: {status}")]
  HttpStatus { status: u16 },

  /// Body or cache envelope could not be
  /// decoded.
  #[error("malformed data: {0}")]
  MalformedData(String)
}

/// Rejected user-supplied date or year.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  thiserror::Error,
)]
pub enum ValidationError {
  #[error("no date given")]
  Empty,

  #[error("invalid date format: {0}")]
  Unparsable(String),

  #[error(
    "year {year} is outside the \
     supported range {min}-{max}"
  )]
  YearOutOfRange {
    year: i32,
    min:  i32,
    max:  i32
  }
}

/// Result of a fetch that never throws to
/// its caller.
///
/// `Empty` is a confirmed "nothing there"
/// (HTTP 404/204 or a cached empty value);
/// `Failed` means the data is unknown and
/// callers should keep whatever they were
/// showing.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
  Loaded(T),
  Empty(T),
  Failed(FetchError)
}

impl<T> FetchOutcome<T> {
  pub fn data(&self) -> Option<&T> {
    match self {
      | Self::Loaded(data)
      | Self::Empty(data) => Some(data),
      | Self::Failed(_) => None
    }
  }

  pub fn into_data(self) -> Option<T> {
    match self {
      | Self::Loaded(data)
      | Self::Empty(data) => Some(data),
      | Self::Failed(_) => None
    }
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, Self::Failed(_))
  }

  pub fn is_empty_valid(&self) -> bool {
    matches!(self, Self::Empty(_))
  }

  pub fn error(
    &self
  ) -> Option<&FetchError> {
    match self {
      | Self::Failed(err) => Some(err),
      | _ => None
    }
  }
}

impl<T: Default> FetchOutcome<T> {
  /// Degraded view of the outcome: the
  /// data, or an empty value on failure.
  pub fn into_data_or_default(
    self
  ) -> T {
    self.into_data().unwrap_or_default()
  }
}
