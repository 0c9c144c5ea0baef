use db::user::{remove_login_cookie, User};
use rocket::{
    http::CookieJar,
    response::{Flash, Redirect},
};

#[get("/logout")]
pub async fn logout(user: Option<User>, jar: &CookieJar<'_>) -> Flash<Redirect> {
    remove_login_cookie(jar);
    if let Some(user) = user {
        tracing::info!(user_id = user.id, "logged out");
    }
    Flash::success(Redirect::to("/"), "You have been logged out.")
}
