use std::sync::Arc;

use anyhow::Result;
use chrono::{FixedOffset, Local, Offset};
use shared::domain::{TimezoneOffset, SENDER_NAME_COOKIE, TIMEZONE_COOKIE};
use tracing::debug;

use crate::{capabilities::CookieStore, cookies::read_cookie};

/// Cookie-backed view of who the local user is.
#[derive(Clone)]
pub struct IdentityResolver {
    cookies: Arc<dyn CookieStore>,
}

impl IdentityResolver {
    pub fn new(cookies: Arc<dyn CookieStore>) -> Self {
        Self { cookies }
    }

    pub fn read_cookie(&self, name: &str) -> Option<String> {
        read_cookie(&self.cookies.cookie_header(), name)
    }

    pub fn sender_name(&self) -> Option<String> {
        self.read_cookie(SENDER_NAME_COOKIE)
    }

    pub fn cookie_header(&self) -> String {
        self.cookies.cookie_header()
    }

    pub fn cookies(&self) -> &Arc<dyn CookieStore> {
        &self.cookies
    }

    /// Writes the host's current UTC offset as the `timezone` cookie.
    pub fn write_timezone_cookie(&self) -> Result<TimezoneOffset> {
        self.write_timezone_cookie_at(Local::now().offset().fix())
    }

    pub fn write_timezone_cookie_at(&self, offset: FixedOffset) -> Result<TimezoneOffset> {
        let offset = TimezoneOffset::from_fixed_offset(offset);
        self.cookies.set_cookie(TIMEZONE_COOKIE, &offset.to_string())?;
        debug!(minutes = offset.minutes(), "timezone cookie written");
        Ok(offset)
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
