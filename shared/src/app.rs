use tracing::{debug, error, info, warn};

use crate::analysis::{classify_attempt, AnalysisRun, NextStep};
use crate::capabilities::{from_http, Capabilities, ContentType, TimerOutput, ValidatedUrl};
use crate::event::Event;
use crate::image_source::ImageHandle;
use crate::model::{Model, Notice, UiState, ViewModel};
use crate::multipart::{encode_upload, MultipartBody};
use crate::prompt_config::{LoadOutcome, PromptConfig};
use crate::report::{self, AnalysisOutcome, FailureView};
use crate::{AppError, AppResult, ErrorKind, NO_FILE_SELECTED_MESSAGE};

const ANALYSIS_IN_PROGRESS_MESSAGE: &str = "An analysis is already in progress.";
const SELECTION_LOCKED_MESSAGE: &str =
    "Reset the current analysis before selecting a new image.";
const RESET_LOCKED_MESSAGE: &str = "The analysis cannot be reset while it is running.";
const RESULTS_SHOWN_MESSAGE: &str = "Reset the current analysis before analyzing again.";

#[derive(Default)]
pub struct App;

impl App {
    fn build_upload(model: &Model) -> AppResult<(ValidatedUrl, MultipartBody)> {
        let image = model
            .image
            .as_ref()
            .ok_or_else(|| AppError::new(ErrorKind::Input, NO_FILE_SELECTED_MESSAGE))?;
        let url = model.config.analyze_url()?;
        let body = encode_upload(
            &model.config.upload_field,
            image.name(),
            image.media_type(),
            image.bytes(),
        )?;
        Ok((url, body))
    }

    /// Sends the current attempt of the active run. Responses carry the run
    /// id and attempt so late ones can be recognised.
    fn send_attempt(model: &Model, caps: &Capabilities) -> AppResult<()> {
        let run = model
            .run
            .as_ref()
            .ok_or_else(|| AppError::new(ErrorKind::InvalidState, "No analysis is running"))?;
        let (url, body) = Self::build_upload(model)?;

        let run_id = run.id;
        let attempt = run.attempt();
        let content_type = body.content_type().header_value();

        info!(
            %run_id,
            attempt,
            url = %url,
            bytes = body.as_bytes().len(),
            "sending analysis request"
        );

        caps.http
            .post(url.as_str())
            .body_bytes(body.into_bytes())
            .header("Content-Type", content_type.as_str())
            .send(move |result| Event::AnalysisReceived {
                run_id,
                attempt,
                result: Box::new(from_http(result)),
            });
        Ok(())
    }

    fn start_analysis(model: &mut Model, caps: &Capabilities) {
        if model.is_analyzing() {
            warn!(state = %model.ui_state, "analysis refused: already in flight");
            model.notice = Some(Notice::warning(ANALYSIS_IN_PROGRESS_MESSAGE));
            return;
        }

        if model.ui_state == UiState::ResultsShown {
            warn!(state = %model.ui_state, "analysis refused: results still shown");
            model.notice = Some(Notice::warning(RESULTS_SHOWN_MESSAGE));
            return;
        }

        // Check the request can be built before touching any state.
        if let Err(e) = Self::build_upload(model) {
            warn!(error = %e, "analysis refused");
            model.set_error(&e);
            return;
        }

        let run = AnalysisRun::new(model.config.max_retries);
        info!(run_id = %run.id, max_attempts = run.retry.max_attempts, "analysis started");
        model.run = Some(run);
        model.outcome = None;
        model.notice = None;

        let ticker = model.next_timer_id();
        for stale in model.progress.start(ticker) {
            caps.timer.cancel(stale);
        }
        caps.timer
            .after(ticker, model.config.progress.tick_interval_ms, Event::ProgressTick);

        model.set_state(UiState::Analyzing);

        if let Err(e) = Self::send_attempt(model, caps) {
            Self::fail_run(model, caps, &e);
        }
    }

    fn handle_response(model: &mut Model, caps: &Capabilities, outcome_step: NextStep) {
        let Some(run) = model.run.as_ref() else {
            return;
        };
        let run_id = run.id;

        match outcome_step {
            NextStep::Retry { attempt } => {
                warn!(%run_id, attempt, "analysis output rejected, retrying");
                if let Err(e) = Self::send_attempt(model, caps) {
                    Self::fail_run(model, caps, &e);
                }
            }
            NextStep::Succeeded(validated) => {
                let Some(image) = model.image.as_ref() else {
                    let e = AppError::new(
                        ErrorKind::InvalidState,
                        "Image was cleared during analysis",
                    );
                    Self::fail_run(model, caps, &e);
                    return;
                };
                let view = report::render(&validated, image);
                info!(
                    %run_id,
                    attempt = model.run.as_ref().map_or(0, AnalysisRun::attempt),
                    hazards = validated.hazards.len(),
                    overlays = view.overlay_count(),
                    "analysis succeeded"
                );
                model.outcome = Some(AnalysisOutcome::Success(view));
                Self::complete_progress(model, caps, true);
            }
            NextStep::Exhausted(e) => {
                error!(%run_id, error = %e, "analysis retries exhausted");
                Self::fail_run(model, caps, &e);
            }
            NextStep::Aborted(e) => {
                error!(%run_id, error = %e, "analysis aborted");
                Self::fail_run(model, caps, &e);
            }
        }
    }

    fn fail_run(model: &mut Model, caps: &Capabilities, e: &AppError) {
        model.outcome = Some(AnalysisOutcome::Failure(FailureView::from_error(e)));
        Self::complete_progress(model, caps, false);
    }

    /// Snaps the bar to 100% and arms the hold timer; the state moves to
    /// `results-shown` when the hold elapses.
    fn complete_progress(model: &mut Model, caps: &Capabilities, success: bool) {
        let hold = model.next_timer_id();
        let config = model.config.progress;
        match model.progress.complete(success, hold, &config) {
            Some(completion) => {
                if let Some(ticker) = completion.cancelled_ticker {
                    caps.timer.cancel(ticker);
                }
                caps.timer
                    .after(hold, completion.hold_ms, Event::ProgressHoldElapsed);
            }
            None => {
                debug!("progress was not running, showing results immediately");
                Self::show_results(model);
            }
        }
    }

    fn show_results(model: &mut Model) {
        if let Some(run) = model.run.take() {
            debug!(run_id = %run.id, status = ?run.status, "run finished");
        }
        model.set_state(UiState::ResultsShown);
    }

    fn select_image(
        model: &mut Model,
        name: String,
        media_type: Option<String>,
        bytes: Vec<u8>,
        display_src: String,
    ) {
        if !model.ui_state.accepts_image() {
            warn!(state = %model.ui_state, "image selection refused");
            model.notice = Some(Notice::warning(SELECTION_LOCKED_MESSAGE));
            return;
        }

        match ImageHandle::from_selection(name, media_type.as_deref(), bytes, display_src) {
            Ok(image) => {
                info!(
                    name = image.name(),
                    media_type = image.media_type(),
                    size = image.size(),
                    "image selected"
                );
                model.image = Some(image);
                model.outcome = None;
                model.notice = None;
                model.set_state(UiState::ImageLoaded);
            }
            Err(e) => {
                let e = AppError::from(e);
                warn!(error = %e, "image rejected");
                model.set_error(&e);
            }
        }
    }

    fn reset(model: &mut Model, caps: &Capabilities) {
        if model.is_analyzing() {
            warn!("reset refused while analyzing");
            model.notice = Some(Notice::warning(RESET_LOCKED_MESSAGE));
            return;
        }
        for timer in model.progress.reset() {
            caps.timer.cancel(timer);
        }
        model.image = None;
        model.run = None;
        model.outcome = None;
        model.notice = None;
        model.set_state(UiState::Initial);
    }

    fn load_prompt_config(model: &mut Model, caps: &Capabilities) {
        let url = match model.config.load_config_url() {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "config load url invalid");
                model.set_error(&e);
                return;
            }
        };
        model.prompt.begin_load();
        debug!(url = %url, "loading prompt configuration");
        caps.http
            .get(url.as_str())
            .send(|result| Event::ConfigLoaded(Box::new(from_http(result))));
    }

    fn save_prompt_config(model: &mut Model, caps: &Capabilities, config: PromptConfig) {
        if model.prompt.saving {
            warn!("config save refused: previous save still pending");
            return;
        }
        let url = match model.config.save_config_url() {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "config save url invalid");
                model.set_error(&e);
                return;
            }
        };
        let config = match model.prompt.begin_save(config) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "config save refused");
                return;
            }
        };
        let body = match serde_json::to_vec(&config) {
            Ok(body) => body,
            Err(e) => {
                let e = AppError::new(ErrorKind::Internal, "Could not encode configuration")
                    .with_internal(e.to_string());
                error!(error = %e, "config save failed");
                model.prompt.saving = false;
                model.set_error(&e);
                return;
            }
        };
        debug!(url = %url, bytes = body.len(), "saving prompt configuration");
        caps.http
            .post(url.as_str())
            .body_bytes(body)
            .header("Content-Type", ContentType::Json.header_value().as_str())
            .send(|result| Event::ConfigSaved(Box::new(from_http(result))));
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(
            event = event.name(),
            user_initiated = event.is_user_initiated(),
            state = %model.ui_state,
            "update"
        );

        match event {
            Event::Noop => {}

            Event::ClientConfigured(config) => {
                if model.is_analyzing() {
                    warn!("client configuration refused while analyzing");
                    model.notice = Some(Notice::warning(ANALYSIS_IN_PROGRESS_MESSAGE));
                } else {
                    match config.validate() {
                        Ok(()) => {
                            info!(
                                analyze_url = %config.analyze_url,
                                max_retries = config.max_retries,
                                "client configured"
                            );
                            model.config = *config;
                        }
                        Err(e) => {
                            error!(error = %e, "client configuration rejected");
                            model.set_error(&e);
                        }
                    }
                }
                caps.render.render();
            }

            Event::ImageSelected {
                name,
                media_type,
                bytes,
                display_src,
            } => {
                Self::select_image(model, name, media_type, bytes, display_src);
                caps.render.render();
            }

            Event::ResetRequested => {
                Self::reset(model, caps);
                caps.render.render();
            }

            Event::AnalyzeRequested => {
                Self::start_analysis(model, caps);
                caps.render.render();
            }

            Event::AnalysisReceived {
                run_id,
                attempt,
                result,
            } => {
                let Some(run) = model.run.as_mut().filter(|run| run.awaits(run_id, attempt)) else {
                    warn!(%run_id, attempt, "ignoring response for an inactive run or attempt");
                    return;
                };

                let outcome = classify_attempt(*result);
                debug!(%run_id, attempt, outcome = outcome.label(), "attempt classified");
                let next = run.record(outcome);
                Self::handle_response(model, caps, next);
                caps.render.render();
            }

            Event::ProgressTick(output) => {
                let TimerOutput::Elapsed { id } = output else {
                    return;
                };
                let config = model.config.progress;
                match model.progress.tick(id, &config) {
                    crate::progress::TickResult::Advanced(_) => {
                        caps.timer
                            .after(id, config.tick_interval_ms, Event::ProgressTick);
                        caps.render.render();
                    }
                    crate::progress::TickResult::CeilingReached => {
                        debug!(percent = model.progress.percent(), "progress ceiling reached");
                        caps.render.render();
                    }
                    crate::progress::TickResult::Stale => {
                        debug!(timer = %id, "stale progress tick");
                    }
                }
            }

            Event::ProgressHoldElapsed(output) => {
                let TimerOutput::Elapsed { id } = output else {
                    return;
                };
                if model.progress.finish(id).is_some() {
                    Self::show_results(model);
                    caps.render.render();
                } else {
                    debug!(timer = %id, "stale progress hold");
                }
            }

            Event::ConfigLoadRequested => {
                Self::load_prompt_config(model, caps);
                caps.render.render();
            }

            Event::ConfigLoaded(result) => {
                match model.prompt.apply_load(*result) {
                    LoadOutcome::Loaded => info!("prompt configuration loaded"),
                    LoadOutcome::Defaulted { status } => {
                        warn!(status, "could not load config from server, using defaults");
                    }
                    LoadOutcome::Failed { reason } => {
                        error!(reason = %reason, "prompt configuration load failed");
                    }
                }
                caps.render.render();
            }

            Event::ConfigSaveRequested(config) => {
                Self::save_prompt_config(model, caps, *config);
                caps.render.render();
            }

            Event::ConfigSaved(result) => {
                if model.prompt.apply_save(*result) {
                    info!("prompt configuration saved");
                } else {
                    warn!("prompt configuration save failed");
                }
                caps.render.render();
            }

            Event::ConfigResetToDefaults => {
                model.prompt.reset_to_defaults();
                caps.render.render();
            }

            Event::DismissNotice => {
                model.notice = None;
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from_model(model)
    }
}
