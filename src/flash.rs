use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

const FLASH_COOKIE: &str = "moodlog_flash";

/// One-shot notices carried across a redirect. Only the code travels in the cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    Registered,
    LoggedIn,
    LoggedOut,
}

impl Flash {
    fn code(self) -> &'static str {
        match self {
            Flash::Registered => "registered",
            Flash::LoggedIn => "logged-in",
            Flash::LoggedOut => "logged-out",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "registered" => Some(Flash::Registered),
            "logged-in" => Some(Flash::LoggedIn),
            "logged-out" => Some(Flash::LoggedOut),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Flash::Registered => "Registration successful! Please log in.",
            Flash::LoggedIn => "Logged in successfully!",
            Flash::LoggedOut => "Logged out successfully!",
        }
    }
}

pub fn set(jar: CookieJar, flash: Flash) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, flash.code()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Reads and clears the pending notice.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let Some(code) = jar.get(FLASH_COOKIE).map(|c| c.value().to_owned()) else {
        return (jar, None);
    };
    (
        jar.remove(Cookie::build(FLASH_COOKIE).path("/")),
        Flash::from_code(&code),
    )
}
