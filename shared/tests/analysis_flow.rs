use assert_matches::assert_matches;
use crux_core::testing::AppTester;
use hazard_shared::capabilities::{TimerOutput, TransportError, TransportResponse, TransportResult};
use hazard_shared::model::NoticeKind;
use hazard_shared::progress::{FAILURE_COLOR, SUCCESS_COLOR};
use hazard_shared::report::{AnalysisOutcome, HazardList, NO_HAZARDS_MESSAGE};
use hazard_shared::{
    App, Effect, Event, Model, UiState, EXHAUSTED_RETRIES_MESSAGE,
    NETWORK_FAILURE_MESSAGE, NO_FILE_SELECTED_MESSAGE,
};
use serde_json::{json, Value};

fn http_requests(effects: &[Effect]) -> usize {
    effects.iter().filter(|e| matches!(e, Effect::Http(_))).count()
}

fn select_image(app: &AppTester<App, Effect>, model: &mut Model) {
    app.update(
        Event::ImageSelected {
            name: "loading-dock.jpg".into(),
            media_type: Some("image/jpeg".into()),
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
            display_src: "data:image/jpeg;base64,AAAA".into(),
        },
        model,
    );
}

fn ok_json(value: &Value) -> TransportResult {
    Ok(TransportResponse::new(200, serde_json::to_vec(value).unwrap()))
}

fn invalid_body() -> Value {
    json!({
        "description": "Warehouse aisle",
        "hazards": [{"category": "Storage", "observation": "Overloaded rack", "risk": "High",
            "markup": {"top": 80, "left": 10, "width": 10, "height": 30}}]
    })
}

fn valid_body() -> Value {
    json!({
        "description": "Warehouse aisle",
        "PPE": "The picker wears a high-visibility vest.",
        "hazards": [
            {"category": "Storage", "observation": "Overloaded rack", "risk": "High",
                "markup": {"top": 10, "left": 10, "width": 30, "height": 40}},
            {"category": "Ergonomics", "observation": "Overhead reach", "risk": "Medium"}
        ]
    })
}

/// Answers the attempt the model is currently waiting for.
fn respond(
    app: &AppTester<App, Effect>,
    model: &mut Model,
    result: TransportResult,
) -> Vec<Effect> {
    let run = model.run.as_ref().expect("a run should be active");
    let event = Event::AnalysisReceived {
        run_id: run.id,
        attempt: run.attempt(),
        result: Box::new(result),
    };
    app.update(event, model).effects
}

fn finish_hold(app: &AppTester<App, Effect>, model: &mut Model) {
    let id = model.progress.hold().expect("hold timer should be armed");
    app.update(Event::ProgressHoldElapsed(TimerOutput::Elapsed { id }), model);
}

#[test]
fn test_analyze_without_image_is_refused() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::AnalyzeRequested, &mut model);
    assert_eq!(http_requests(&update.effects), 0);
    assert_eq!(model.ui_state, UiState::Initial);
    assert!(model.run.is_none());
    let notice = model.notice.as_ref().unwrap();
    assert_eq!(notice.message, NO_FILE_SELECTED_MESSAGE);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Render(_))));
}

#[test]
fn test_all_attempts_invalid_exhausts_after_three_requests() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    assert_eq!(model.ui_state, UiState::ImageLoaded);

    let mut requests = http_requests(&app.update(Event::AnalyzeRequested, &mut model).effects);
    assert_eq!(model.ui_state, UiState::Analyzing);

    for _ in 0..3 {
        requests += http_requests(&respond(&app, &mut model, ok_json(&invalid_body())));
    }
    assert_eq!(requests, 3);

    // Still analyzing during the failure hold.
    assert_eq!(model.ui_state, UiState::Analyzing);
    assert_eq!(model.progress.percent(), 100);
    assert_eq!(app.view(&model).progress.color, FAILURE_COLOR);

    finish_hold(&app, &mut model);
    assert_eq!(model.ui_state, UiState::ResultsShown);
    let view = app.view(&model);
    assert_matches!(
        view.outcome,
        Some(AnalysisOutcome::Failure(ref failure))
            if failure.message == EXHAUSTED_RETRIES_MESSAGE && failure.retry_label == "Try Again"
    );
    assert!(!view.progress.visible);
}

#[test]
fn test_server_error_on_first_attempt_is_fatal() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);

    let first = http_requests(&app.update(Event::AnalyzeRequested, &mut model).effects);
    let after = respond(
        &app,
        &mut model,
        Ok(TransportResponse::new(500, b"Internal Server Error".to_vec())),
    );
    assert_eq!(first + http_requests(&after), 1);

    finish_hold(&app, &mut model);
    assert_matches!(
        app.view(&model).outcome,
        Some(AnalysisOutcome::Failure(ref failure)) if failure.message == "Server Error 500"
    );
}

#[test]
fn test_network_failure_shows_connection_message() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    app.update(Event::AnalyzeRequested, &mut model);

    let effects = respond(
        &app,
        &mut model,
        Err(TransportError::Network {
            message: "connection reset".into(),
        }),
    );
    assert_eq!(http_requests(&effects), 0);

    finish_hold(&app, &mut model);
    assert_matches!(
        app.view(&model).outcome,
        Some(AnalysisOutcome::Failure(ref failure)) if failure.message == NETWORK_FAILURE_MESSAGE
    );
}

#[test]
fn test_invalid_then_valid_succeeds_on_second_request() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);

    let mut requests = http_requests(&app.update(Event::AnalyzeRequested, &mut model).effects);
    requests += http_requests(&respond(&app, &mut model, ok_json(&invalid_body())));
    assert_eq!(model.run.as_ref().unwrap().attempt(), 2);

    let stale_run = model.run.as_ref().unwrap().id;
    requests += http_requests(&respond(&app, &mut model, ok_json(&valid_body())));
    assert_eq!(requests, 2);

    assert_eq!(model.progress.percent(), 100);
    assert_eq!(app.view(&model).progress.color, SUCCESS_COLOR);

    // A duplicate response for the finished run changes nothing.
    let late = app.update(
        Event::AnalysisReceived {
            run_id: stale_run,
            attempt: 2,
            result: Box::new(ok_json(&invalid_body())),
        },
        &mut model,
    );
    assert!(late.effects.is_empty());
    assert_eq!(app.view(&model).progress.color, SUCCESS_COLOR);

    finish_hold(&app, &mut model);
    assert_eq!(model.ui_state, UiState::ResultsShown);

    let view = app.view(&model);
    let Some(AnalysisOutcome::Success(report)) = view.outcome else {
        panic!("expected a report");
    };
    assert_eq!(report.overlay_count(), 1);
    assert_eq!(report.image.overlays[0].label, 1);
    assert_eq!(report.image.src, "data:image/jpeg;base64,AAAA");
    assert_eq!(report.sections.len(), 2);
    assert_matches!(
        report.hazards,
        HazardList::Cards(ref cards) if cards.len() == 2 && cards[0].risk_color == "#dc3545"
    );
    assert_eq!(report.reset_label, "Analyze Another Image");
}

#[test]
fn test_zero_hazards_renders_placeholder() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    app.update(Event::AnalyzeRequested, &mut model);
    respond(&app, &mut model, ok_json(&json!({"description": "Empty office", "hazards": []})));
    finish_hold(&app, &mut model);

    let Some(AnalysisOutcome::Success(report)) = app.view(&model).outcome else {
        panic!("expected a report");
    };
    assert_eq!(report.hazards, HazardList::Placeholder(NO_HAZARDS_MESSAGE.into()));
}

#[test]
fn test_second_trigger_while_in_flight_is_refused() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    app.update(Event::AnalyzeRequested, &mut model);
    let run_id = model.run.as_ref().unwrap().id;

    let update = app.update(Event::AnalyzeRequested, &mut model);
    assert_eq!(http_requests(&update.effects), 0);
    assert_eq!(model.run.as_ref().unwrap().id, run_id);
    assert_eq!(model.notice.as_ref().unwrap().kind, NoticeKind::Warning);
}

#[test]
fn test_progress_ticks_advance_and_stop_at_ceiling() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    app.update(Event::AnalyzeRequested, &mut model);

    let ticker = model.progress.ticker().unwrap();
    let update = app.update(Event::ProgressTick(TimerOutput::Elapsed { id: ticker }), &mut model);
    assert_eq!(model.progress.percent(), 1);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Timer(_))));

    for _ in 0..200 {
        app.update(Event::ProgressTick(TimerOutput::Elapsed { id: ticker }), &mut model);
    }
    assert_eq!(model.progress.percent(), 90);
    assert!(model.progress.ticker().is_none());

    // Resolution after the ceiling still completes normally.
    respond(&app, &mut model, ok_json(&valid_body()));
    assert_eq!(model.progress.percent(), 100);
    finish_hold(&app, &mut model);
    assert_eq!(model.ui_state, UiState::ResultsShown);
}

#[test]
fn test_hold_timer_from_other_run_is_ignored() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    app.update(Event::AnalyzeRequested, &mut model);
    respond(&app, &mut model, ok_json(&valid_body()));

    let hold = model.progress.hold().unwrap();
    let bogus = hazard_shared::capabilities::TimerId(hold.0 + 100);
    app.update(Event::ProgressHoldElapsed(TimerOutput::Elapsed { id: bogus }), &mut model);
    assert_eq!(model.ui_state, UiState::Analyzing);

    app.update(Event::ProgressHoldElapsed(TimerOutput::Elapsed { id: hold }), &mut model);
    assert_eq!(model.ui_state, UiState::ResultsShown);
}

#[test]
fn test_loosely_typed_text_fields_still_render() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    app.update(Event::AnalyzeRequested, &mut model);

    let body = json!({
        "description": "Loading bay",
        "PPE": ["hard hat", "vest"],
        "hazards": [{"category": 3, "observation": "Pallet jack", "risk": "Low",
            "markup": {"top": 20, "left": 20, "width": 10, "height": 10}}]
    });
    let effects = respond(&app, &mut model, ok_json(&body));
    assert_eq!(http_requests(&effects), 0);
    assert_eq!(app.view(&model).progress.color, SUCCESS_COLOR);

    finish_hold(&app, &mut model);
    let Some(AnalysisOutcome::Success(report)) = app.view(&model).outcome else {
        panic!("expected a report");
    };
    assert!(report.sections.iter().any(|s| s.body == "hard hat, vest"));
    assert_matches!(
        report.hazards,
        HazardList::Cards(ref cards) if cards.len() == 1
    );
    assert_eq!(report.overlay_count(), 1);
}

#[test]
fn test_analyze_from_results_shown_is_refused() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    app.update(Event::AnalyzeRequested, &mut model);
    respond(&app, &mut model, ok_json(&valid_body()));
    finish_hold(&app, &mut model);
    assert_eq!(model.ui_state, UiState::ResultsShown);

    let update = app.update(Event::AnalyzeRequested, &mut model);
    assert_eq!(http_requests(&update.effects), 0);
    assert_eq!(model.ui_state, UiState::ResultsShown);
    assert_eq!(model.notice.as_ref().unwrap().kind, NoticeKind::Warning);
    assert_matches!(app.view(&model).outcome, Some(AnalysisOutcome::Success(_)));
}

#[test]
fn test_out_of_range_markup_number_is_retried() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    select_image(&app, &mut model);
    app.update(Event::AnalyzeRequested, &mut model);

    let overflow = br#"{"hazards": [{"category": "PPE", "risk": "High",
        "markup": {"top": 1e400, "left": 0, "width": 5, "height": 5}}]}"#;
    let effects = respond(
        &app,
        &mut model,
        Ok(TransportResponse::new(200, overflow.to_vec())),
    );
    assert_eq!(http_requests(&effects), 1);
    assert_eq!(model.run.as_ref().unwrap().attempt(), 2);
    assert_eq!(model.ui_state, UiState::Analyzing);
}
