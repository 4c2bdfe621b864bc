//! Personal QR codes: issue a fresh token and render it; validate scans.

use crate::clock::Clock;
use crate::error::AppResult;
use crate::model::user::UserId;
use crate::render::QrRenderer;
use crate::token::TokenSigner;
use serde::Serialize;
use std::sync::Arc;

/// What a user's dashboard needs to show a scannable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrCodeData {
    pub token: String,
    pub image: String,
    pub media_type: &'static str,
    /// How often the displayed code should be regenerated.
    pub refresh_seconds: u64,
}

pub struct QrService {
    signer: TokenSigner,
    renderer: Arc<dyn QrRenderer>,
    clock: Arc<dyn Clock>,
}

impl QrService {
    pub fn new(signer: TokenSigner, renderer: Arc<dyn QrRenderer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            signer,
            renderer,
            clock,
        }
    }

    /// Issues a token bound to now and renders it.
    pub fn create_qr(&self, user_id: UserId) -> AppResult<QrCodeData> {
        let token = self.signer.issue(user_id, self.clock.now_unix())?;
        let image = self.renderer.render(&token)?;
        Ok(QrCodeData {
            token,
            image,
            media_type: self.renderer.media_type(),
            refresh_seconds: self.signer.expiration_secs(),
        })
    }

    /// Returns the user id of a valid, unexpired token.
    pub fn validate(&self, token: &str) -> Option<UserId> {
        self.signer.verify(token.trim(), self.clock.now_unix())
    }
}
