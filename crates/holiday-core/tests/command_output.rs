mod common;

use common::{Fixture, date, fr_2024};
use holiday_core::commands::{Command, dispatch_to};
use holiday_core::render::Renderer;
use holiday_core::state::ViewMode;

#[tokio::test]
async fn rejected_jump_is_returned_without_printing() {
    let fx = Fixture::new(date(2024, 3, 1));
    let controller = fx.controller();
    let before = controller.state();
    let mut out = Vec::new();

    let err = dispatch_to(
        &mut out,
        &controller,
        &Renderer::plain(),
        Command::Jump("1800-01-01".to_string()),
    )
    .await
    .expect_err("year outside range");

    let message = format!("{err:#}");
    assert!(message.contains("1800-01-01"));
    assert!(message.contains("outside the supported range 1926-2126"));
    assert!(out.is_empty());
    assert_eq!(controller.state(), before);
}

#[tokio::test]
async fn accepted_jump_prints_the_target_month() {
    let fx = Fixture::new(date(2024, 3, 1));
    fx.api.respond("PublicHolidays/2024/FR", 200, &fr_2024());
    let controller = fx.controller();
    controller.switch_view(ViewMode::Week).await;
    let mut out = Vec::new();

    dispatch_to(
        &mut out,
        &controller,
        &Renderer::plain(),
        Command::Jump("2024-07-14".to_string()),
    )
    .await
    .expect("jump");

    let text = String::from_utf8(out).expect("utf8 output");
    assert!(text.contains("July 2024"));
    assert!(text.contains("[14"));
    assert!(!text.contains("unavailable"));
    assert_eq!(controller.state().view, ViewMode::Month);
}
