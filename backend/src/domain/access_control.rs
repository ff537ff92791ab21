//! # Access Control
//!
//! PIN lock for the terminal.
//!
//! ```text
//!            submit(pin)                 5th wrong PIN
//!   Locked ─────────────▶ Unlocked    Locked ───────────▶ Halted
//!     ▲                      │          ▲                   │
//!     └──────── lock() ──────┘          └── submit(master) ─┘
//! ```
//!
//! ## Key Responsibilities
//!
//! - Compare submitted codes with the PIN and master code cached in the
//!   [`SessionContext`]
//! - Count consecutive failed PIN attempts and halt the terminal at
//!   [`MAX_ATTEMPTS`]
//! - Persist the halt flag so a restart does not clear a lockout
//! - Guard the security settings screen with a one-shot master code check
//! - Check the code challenge that guards deletions
//!
//! Attempted codes are never logged, only their length.

use shared::{AccessState, SecurityCodes};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use super::context::SessionContext;
use super::errors::BuybackError;
use crate::storage::HaltFlagStorage;

/// Consecutive wrong PINs that halt the terminal
pub const MAX_ATTEMPTS: u32 = 5;
pub const MIN_PIN_LENGTH: usize = 4;
pub const MIN_MASTER_CODE_LENGTH: usize = 6;

const RESET_SUBJECT: &str = "Urgent: KB Gold System Locked";
const RESET_BODY: &str = "The System has been locked due to too many failed PIN attempts. \
                          Please provide the Master Reset Code to unlock it.";

/// What happened to a submitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Unlocked,
    /// Wrong PIN, terminal still locked
    Rejected { remaining_attempts: u32 },
    /// Wrong PIN that used up the last attempt
    Halted,
    /// Master code accepted while halted, terminal back to locked
    SystemReset,
    /// Anything but the master code while halted
    InvalidMasterCode,
    AlreadyUnlocked,
}

impl PinOutcome {
    /// Operator-facing message for the outcome
    pub fn message(&self) -> String {
        match self {
            PinOutcome::Unlocked => "Unlocked".to_string(),
            PinOutcome::Rejected { remaining_attempts } => {
                format!("Incorrect PIN. {} attempts remaining.", remaining_attempts)
            }
            PinOutcome::Halted => {
                "System halted after too many failed attempts. Enter the master reset code."
                    .to_string()
            }
            PinOutcome::SystemReset => "System reset. Please enter your PIN.".to_string(),
            PinOutcome::InvalidMasterCode => "Invalid master code".to_string(),
            PinOutcome::AlreadyUnlocked => "Already unlocked".to_string(),
        }
    }
}

/// Message asking the owner for the master reset code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRequest {
    pub recipient: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Whether `code` passes the delete challenge: either code is accepted
pub fn delete_code_matches(codes: &SecurityCodes, code: &str) -> bool {
    code == codes.pin || code == codes.master_code
}

#[derive(Debug)]
struct AccessSession {
    state: AccessState,
    failed_attempts: u32,
}

/// Lock state machine for one terminal
pub struct AccessControlService {
    context: SessionContext,
    halt_flag: Arc<dyn HaltFlagStorage>,
    session: Mutex<AccessSession>,
    owner_contact: Option<String>,
}

impl AccessControlService {
    /// Start locked, or halted when the persisted flag says so.
    ///
    /// An unreadable flag is logged and treated as not halted.
    pub fn new(context: SessionContext, halt_flag: Arc<dyn HaltFlagStorage>) -> Self {
        let halted = halt_flag.is_halted().unwrap_or_else(|e| {
            error!("Failed to read halt flag, starting locked: {}", e);
            false
        });
        let state = if halted {
            warn!("Terminal is halted from a previous session");
            AccessState::Halted
        } else {
            AccessState::Locked
        };

        Self {
            context,
            halt_flag,
            session: Mutex::new(AccessSession {
                state,
                failed_attempts: 0,
            }),
            owner_contact: None,
        }
    }

    /// Address the lockout reset request is sent to
    pub fn with_owner_contact(mut self, contact: Option<String>) -> Self {
        self.owner_contact = contact.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn state(&self) -> AccessState {
        self.session().state
    }

    pub fn failed_attempts(&self) -> u32 {
        self.session().failed_attempts
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == AccessState::Unlocked
    }

    /// Submit a code on the lock screen
    pub fn submit(&self, code: &str) -> PinOutcome {
        let codes = self.context.security_codes();
        let mut session = self.session();

        match session.state {
            AccessState::Unlocked => PinOutcome::AlreadyUnlocked,
            AccessState::Locked => {
                if code == codes.pin {
                    session.failed_attempts = 0;
                    session.state = AccessState::Unlocked;
                    info!("Terminal unlocked");
                    return PinOutcome::Unlocked;
                }

                session.failed_attempts += 1;
                warn!(
                    "Rejected PIN (length {}), attempt {} of {}",
                    code.len(),
                    session.failed_attempts,
                    MAX_ATTEMPTS
                );

                if session.failed_attempts >= MAX_ATTEMPTS {
                    session.state = AccessState::Halted;
                    self.persist_halt(true);
                    error!("Too many failed PIN attempts, terminal halted");
                    PinOutcome::Halted
                } else {
                    PinOutcome::Rejected {
                        remaining_attempts: MAX_ATTEMPTS - session.failed_attempts,
                    }
                }
            }
            AccessState::Halted => {
                if code == codes.master_code {
                    session.failed_attempts = 0;
                    session.state = AccessState::Locked;
                    self.persist_halt(false);
                    info!("Master code accepted, terminal reset to locked");
                    PinOutcome::SystemReset
                } else {
                    warn!("Rejected master code (length {}) while halted", code.len());
                    PinOutcome::InvalidMasterCode
                }
            }
        }
    }

    /// Lock the terminal. Always available; also closes the security gate.
    pub fn lock(&self) {
        let mut session = self.session();
        if session.state == AccessState::Unlocked {
            session.state = AccessState::Locked;
            info!("Terminal locked");
        }
        self.context.set_security_gate(false);
    }

    /// Check the code challenge that guards a deletion. Failures are not
    /// counted towards the lockout.
    pub fn verify_delete_code(&self, code: &str) -> bool {
        let accepted = delete_code_matches(&self.context.security_codes(), code);
        if !accepted {
            warn!("Rejected delete code (length {})", code.len());
        }
        accepted
    }

    /// Open the security settings gate with the master code
    pub fn unlock_security_settings(&self, code: &str) -> Result<(), BuybackError> {
        if !self.is_unlocked() {
            return Err(BuybackError::SecurityGateLocked);
        }
        if code != self.context.security_codes().master_code {
            warn!("Rejected master code (length {}) for security settings", code.len());
            return Err(BuybackError::InvalidCode);
        }
        self.context.set_security_gate(true);
        info!("Security settings unlocked");
        Ok(())
    }

    /// Leaving the security settings screen re-locks it
    pub fn leave_security_settings(&self) {
        if self.context.security_gate_open() {
            self.context.set_security_gate(false);
            info!("Security settings locked");
        }
    }

    pub fn security_settings_open(&self) -> bool {
        self.context.security_gate_open()
    }

    /// The reset request for the owner, only while halted
    pub fn reset_request(&self) -> Option<ResetRequest> {
        if self.state() != AccessState::Halted {
            return None;
        }
        Some(ResetRequest {
            recipient: self.owner_contact.clone(),
            subject: RESET_SUBJECT.to_string(),
            body: RESET_BODY.to_string(),
        })
    }

    fn persist_halt(&self, halted: bool) {
        // The in-memory transition stands even if the flag can not be written
        if let Err(e) = self.halt_flag.set_halted(halted) {
            error!("Failed to persist halt flag ({}): {}", halted, e);
        }
    }

    fn session(&self) -> std::sync::MutexGuard<'_, AccessSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
