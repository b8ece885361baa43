use serde::Deserialize;

/// Form body of `POST /register`.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Form body of `POST /login`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}
