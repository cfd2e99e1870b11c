//! Authorization state machine.
//!
//! The primary channel reports its login state through
//! `updateAuthorizationState`; every report replaces the current state, bumps
//! the generation and runs that state's step. Verification commands carry the
//! generation they were issued under: a failure is retried only while that
//! generation is still current, so a late error never drags the login back to
//! a step the channel has already left.
//!
//! Code steps ask the operator through the relay. The operator's answer comes
//! back as an [`OperatorReply`] on the drive task and is checked against the
//! generation in the same way.

use histfetch_types::{AuthorizationState, EmailAddressAuthentication, Function, Object, TdlibParameters};

use crate::channel::PrimaryChannel;
use crate::dispatcher::Handler;
use crate::relay::Reply;
use crate::Fetcher;

const DEVICE_MODEL:         &str = "Server";
const APPLICATION_VERSION:  &str = "2.0";
const SYSTEM_LANGUAGE_CODE: &str = "en";

// ─── AuthorizationMachine ─────────────────────────────────────────────────────

/// Current authorization state and its generation.
#[derive(Debug, Default)]
pub struct AuthorizationMachine {
    state:      Option<AuthorizationState>,
    generation: u64,
    authorized: bool,
    closed:     bool,
}

impl AuthorizationMachine {
    pub fn new() -> Self { Self::default() }

    /// Most recently reported state, if any.
    pub fn state(&self) -> Option<&AuthorizationState> { self.state.as_ref() }

    /// Bumped every time a state step runs.
    pub fn generation(&self) -> u64 { self.generation }

    pub fn is_authorized(&self) -> bool { self.authorized }

    /// `true` once the channel has reported `closed`.
    pub fn is_closed(&self) -> bool { self.closed }

    fn advance(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

// ─── Operator replies ─────────────────────────────────────────────────────────

/// Which verification command an operator reply feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CodeStep {
    Phone,
    Email,
}

impl CodeStep {
    fn prompt(self) -> &'static str {
        match self {
            Self::Phone => "Reply with the authentication code:",
            Self::Email => "Reply with the email authentication code:",
        }
    }

    fn verification(self, code: String) -> Function {
        match self {
            Self::Phone => Function::CheckAuthenticationCode { code },
            Self::Email => Function::CheckAuthenticationEmailCode {
                code: EmailAddressAuthentication::EmailAddressAuthenticationCode { code },
            },
        }
    }
}

/// A relay continuation's result, posted back to the drive task.
#[derive(Debug)]
pub(crate) struct OperatorReply {
    generation: u64,
    step:       CodeStep,
    reply:      Reply,
}

// ─── State steps ──────────────────────────────────────────────────────────────

impl<C: PrimaryChannel + 'static> Fetcher<C> {
    pub(crate) fn on_authorization_state(&mut self, state: AuthorizationState) {
        log::info!("[histfetch] Authorization state: {}", state.name());
        self.auth.state = Some(state);
        self.run_authorization_step();
    }

    /// Run the step of the current state under a fresh generation.
    fn run_authorization_step(&mut self) {
        let generation = self.auth.advance();
        let Some(state) = self.auth.state.clone() else { return };

        match state {
            AuthorizationState::WaitTdlibParameters => {
                let params = self.tdlib_parameters();
                self.send_verification(Function::SetTdlibParameters(params), generation);
            }
            AuthorizationState::WaitPhoneNumber => {
                let phone_number = self.config.phone.clone();
                self.send_verification(Function::SetAuthenticationPhoneNumber { phone_number }, generation);
            }
            AuthorizationState::WaitEmailAddress => {
                let email_address = self.config.email.clone();
                self.send_verification(Function::SetAuthenticationEmailAddress { email_address }, generation);
            }
            AuthorizationState::WaitRegistration => {
                let first_name = self.config.first_name.clone();
                let last_name  = self.config.last_name.clone();
                self.send_verification(Function::RegisterUser { first_name, last_name }, generation);
            }
            AuthorizationState::WaitPassword { password_hint } => {
                if !password_hint.is_empty() {
                    log::debug!("[histfetch] Password hint: {password_hint}");
                }
                let password = self.config.password.clone();
                self.send_verification(Function::CheckAuthenticationPassword { password }, generation);
            }
            AuthorizationState::WaitCode => self.prompt_for_code(CodeStep::Phone, generation),
            AuthorizationState::WaitEmailCode => self.prompt_for_code(CodeStep::Email, generation),
            AuthorizationState::WaitOtherDeviceConfirmation { link } => {
                self.prompter.send_message(
                    self.config.user_id.clone(),
                    format!("Confirm this login link on another device: {link}"),
                    |_| {},
                );
            }
            AuthorizationState::Ready => {
                self.auth.authorized = true;
                log::info!("[histfetch] Authorized");
            }
            AuthorizationState::LoggingOut | AuthorizationState::Closing => {
                self.auth.authorized = false;
            }
            AuthorizationState::Closed => {
                self.auth.authorized = false;
                self.auth.closed = true;
                log::info!("[histfetch] Session closed, shutting down");
                self.shutdown.request();
            }
            AuthorizationState::Unknown => {
                log::warn!("[histfetch] Unsupported authorization state, waiting for the next one");
            }
        }
    }

    fn tdlib_parameters(&self) -> TdlibParameters {
        TdlibParameters {
            database_directory:   self.config.db.clone(),
            use_message_database: true,
            use_secret_chats:     false,
            api_id:               self.config.api_id,
            api_hash:             self.config.api_hash.clone(),
            system_language_code: SYSTEM_LANGUAGE_CODE.into(),
            device_model:         DEVICE_MODEL.into(),
            application_version:  APPLICATION_VERSION.into(),
        }
    }

    fn send_verification(&mut self, function: Function, generation: u64) {
        self.send(function, Some(Self::verification_handler(generation)));
    }

    fn verification_handler(generation: u64) -> Handler<Self> {
        Box::new(move |ctx: &mut Self, object: Object| ctx.check_verification(generation, object))
    }

    fn check_verification(&mut self, generation: u64, object: Object) {
        let Object::Error(error) = object else { return };
        if generation != self.auth.generation {
            log::debug!("[histfetch] Stale verification error ignored: {error}");
            return;
        }
        let step = self.auth.state.as_ref().map_or("none", AuthorizationState::name);
        log::warn!("[histfetch] Verification failed ({error}), retrying {step}");
        self.run_authorization_step();
    }

    fn prompt_for_code(&mut self, step: CodeStep, generation: u64) {
        let replies = self.replies_tx.clone();
        self.prompter.send_message(self.config.user_id.clone(), step.prompt(), move |reply| {
            // the receiver lives as long as the fetcher
            let _ = replies.send(OperatorReply { generation, step, reply });
        });
    }

    // ── Operator replies ──────────────────────────────────────────────────

    /// Apply every operator reply the relay has delivered so far.
    pub fn drain_operator_replies(&mut self) {
        while let Ok(reply) = self.replies_rx.try_recv() {
            self.on_operator_reply(reply);
        }
    }

    fn on_operator_reply(&mut self, reply: OperatorReply) {
        if reply.generation != self.auth.generation {
            log::debug!("[histfetch] Operator reply for an earlier state dropped");
            return;
        }
        match reply.reply {
            Reply::Answered(message) => {
                let code = message.text().trim().to_owned();
                let generation = self.auth.generation;
                self.send_verification(reply.step.verification(code), generation);
            }
            Reply::Unanswered => {
                log::info!("[histfetch] No answer from the operator, asking again");
                self.run_authorization_step();
            }
        }
    }
}
