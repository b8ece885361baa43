//! Bare HTML pages. Layout is kept to what the flows need: the forms, a notice
//! line and the dashboard list.

use std::fmt::Write;

use axum::response::Html;

use crate::db::{Mood, User};
use crate::moods::insights::Insights;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

/// A flash-style notice shown above a form.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: Level,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, notice: Option<&Notice>, body: &str) -> Html<String> {
    let notice = notice
        .map(|n| {
            let class = match n.level {
                Level::Success => "flash success",
                Level::Error => "flash error",
            };
            format!(r#"<p class="{class}">{}</p>"#, escape(&n.text))
        })
        .unwrap_or_default();
    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title} - moodlog</title></head>\n<body>\n{notice}\n{body}\n</body></html>\n"
    ))
}

pub fn home(username: Option<&str>, notice: Option<&Notice>) -> Html<String> {
    let body = match username {
        Some(name) => format!(
            r#"<h1>Welcome back, {}</h1><p><a href="/dashboard">Dashboard</a> | <a href="/logout">Log out</a></p>"#,
            escape(name)
        ),
        None => r#"<h1>moodlog</h1><p><a href="/login">Log in</a> | <a href="/register">Register</a></p>"#
            .to_string(),
    };
    page("Home", notice, &body)
}

pub fn register_form(notice: Option<&Notice>) -> Html<String> {
    page(
        "Register",
        notice,
        r#"<h1>Register</h1>
<form method="post" action="/register">
<label>Email <input type="email" name="email" required></label>
<label>Username <input name="username" required></label>
<label>Full name <input name="full_name"></label>
<label>Password <input type="password" name="password" required></label>
<label>Confirm password <input type="password" name="confirm_password" required></label>
<button type="submit">Register</button>
</form>"#,
    )
}

pub fn login_form(notice: Option<&Notice>) -> Html<String> {
    page(
        "Log in",
        notice,
        r#"<h1>Log in</h1>
<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Log in</button>
</form>"#,
    )
}

pub fn dashboard(
    user: &User,
    moods: &[Mood],
    summary: &Insights,
    notice: Option<&Notice>,
) -> Html<String> {
    let name = user.full_name.as_deref().unwrap_or(&user.username);
    let mut body = format!("<h1>Hello, {}</h1>\n", escape(name));
    if summary.total_entries > 0 {
        let counts = &summary.mood_counts;
        let _ = writeln!(
            body,
            r#"<p class="insights">{} entries: {} positive, {} neutral, {} negative. Average sentiment {:.2}. Streak: {} day(s).</p>"#,
            summary.total_entries,
            counts.positive,
            counts.neutral,
            counts.negative,
            summary.avg_sentiment,
            summary.current_streak
        );
    }
    if moods.is_empty() {
        body.push_str("<p>No mood entries yet.</p>\n");
    } else {
        body.push_str("<ul>\n");
        for mood in moods {
            let _ = writeln!(
                body,
                "<li>[{}] {} ({:.2}): {}</li>",
                mood.timestamp.date(),
                escape(&mood.sentiment),
                mood.score,
                escape(&mood.entry)
            );
        }
        body.push_str("</ul>\n");
    }
    body.push_str(r#"<p><a href="/logout">Log out</a></p>"#);
    page("Dashboard", notice, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moods::insights::summarize;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<b>"x" & 'y'</b>"#), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }

    #[test]
    fn notice_is_rendered_escaped() {
        let Html(body) = login_form(Some(&Notice::error("<bad>")));
        assert!(body.contains(r#"<p class="flash error">&lt;bad&gt;</p>"#));
    }

    #[test]
    fn dashboard_prefers_full_name() {
        let user = User {
            id: 1,
            email: "a@x.com".into(),
            password_hash: "x".into(),
            username: "alice".into(),
            full_name: Some("Alice Liddell".into()),
        };
        let Html(body) = dashboard(&user, &[], &summarize(&[]), None);
        assert!(body.contains("Hello, Alice Liddell"));
        assert!(body.contains("No mood entries yet."));
        assert!(!body.contains("insights"));
    }

    #[test]
    fn dashboard_shows_counts_and_average() {
        let user = User {
            id: 1,
            email: "a@x.com".into(),
            password_hash: "x".into(),
            username: "alice".into(),
            full_name: None,
        };
        let moods = [0.4, -0.2, 0.0].map(|score| Mood {
            id: 1,
            user_id: 1,
            entry: "entry".into(),
            sentiment: "neutral".into(),
            score,
            timestamp: time::macros::datetime!(2024-03-01 08:00 UTC),
        });
        let Html(body) = dashboard(&user, &moods, &summarize(&moods), None);
        assert!(body.contains("3 entries: 1 positive, 1 neutral, 1 negative."));
        assert!(body.contains("Average sentiment 0.07."));
    }
}
