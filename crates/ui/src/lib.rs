use chrono::NaiveDateTime;
use db::user::User;
use maud::{html, Markup, DOCTYPE};

pub const BRAND: &str = "Campus Fest";

/// Kind of a one-off message shown at the top of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
    Warning,
    Info,
}

impl FlashKind {
    /// Maps Rocket's flash kinds (`"success"`, `"error"`, `"warning"`,
    /// anything else).
    pub fn of_str(kind: &str) -> FlashKind {
        match kind {
            "success" => FlashKind::Success,
            "error" => FlashKind::Error,
            "warning" => FlashKind::Warning,
            _ => FlashKind::Info,
        }
    }

    fn alert_class(&self) -> &'static str {
        match self {
            FlashKind::Success => "alert alert-success",
            FlashKind::Error => "alert alert-danger",
            FlashKind::Warning => "alert alert-warning",
            FlashKind::Info => "alert alert-info",
        }
    }
}

pub fn page_of_body_and_flash_msg(
    body: Markup,
    flash: Option<(FlashKind, String)>,
    user: Option<User>,
) -> Markup {
    page_of_body(
        html! {
            @if let Some((kind, msg)) = flash {
                div class=(kind.alert_class()) role="alert" {
                    (msg)
                }
            }
            (body)
        },
        user,
    )
}

pub fn page_of_body_with_extra_head(
    body: Markup,
    user: Option<User>,
    extra_head: Option<Markup>,
) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                title { (BRAND) }
                script src="https://unpkg.com/htmx.org@2.0.2" integrity="sha384-Y7hw+L/jvKeWIRRkqWYfPcvVxHzVzn5REgzbawhxAuQGwX1XWe70vji+VSeHOThJ" crossorigin="anonymous" {}
                link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-QWTKZyjpPEjISv5WaRU9OFeRpok6YctnYmDr5pNlyT2bRjXh0JMhjY6hW+ALEwIH" crossorigin="anonymous" {}
                meta name="viewport" content="width=device-width, initial-scale=1" {}
                @if let Some(head) = extra_head {
                    (head)
                }
            }
            body {
                nav class="navbar navbar-expand" style="background-color: #1D4E89" data-bs-theme="dark" {
                    div class="container-fluid" {
                        ul class="nav nav-justify-start" {
                            li class="nav-item" {
                                a class="nav-link text-white fw-bold" href="/" { (BRAND) }
                            }
                            li class="nav-item" {
                                a class="nav-link text-white" href="/events" { "Events" }
                            }
                            li class="nav-item" {
                                a class="nav-link text-white" href="/ideas" { "Ideas" }
                            }
                        }
                        ul class="nav nav-justify-end" {
                            @if let Some(user) = &user {
                                @if user.is_admin() {
                                    li class="nav-item" {
                                        a class="nav-link text-white" href="/admin" { "Admin" }
                                    }
                                }
                                li class="nav-item" {
                                    a class="nav-link text-white" href="/registrations" { "My registrations" }
                                }
                                li class="nav-item" {
                                    a class="nav-link text-white" href="/notifications" { "Notifications" }
                                }
                                li class="nav-item" {
                                    a class="nav-link text-white" href="/user" { (user.username) }
                                }
                                li class="nav-item" {
                                    a class="nav-link text-white" href="/logout" { "Logout" }
                                }
                            } @else {
                                li class="nav-item" {
                                    a class="nav-link text-white" href="/login" { "Login" }
                                }
                                li class="nav-item" {
                                    a class="nav-link text-white" href="/register" { "Register" }
                                }
                            }
                        }
                    }
                }
                div class="container" {
                    div class="mt-4" {
                        (body)
                    }
                }
            }
        }
    }
}

/// Renders an HTML page with the provided body markup.
pub fn page_of_body(body: Markup, user: Option<User>) -> Markup {
    page_of_body_with_extra_head(body, user, None)
}

/// A full-page error with a large status code heading.
pub fn error_page<T: ToString>(
    code: u16,
    heading: &str,
    error: Option<T>,
    user: Option<User>,
) -> Markup {
    page_of_body(
        html! {
            div class="text-center" {
                h1 class="display-1 text-danger" { (code) }
                h2 class="mb-4" { (heading) }
                @if let Some(err) = error {
                    div class="alert alert-danger" role="alert" {
                        (err.to_string())
                    }
                }
                a class="btn btn-danger" href="/" { "Return Home" }
            }
        },
        user,
    )
}

pub fn error_403<T: ToString>(error: Option<T>, user: Option<User>) -> Markup {
    error_page(403, "Forbidden", error, user)
}

pub fn error_404<T: ToString>(error: Option<T>, user: Option<User>) -> Markup {
    error_page(404, "Not found", error, user)
}

pub fn page_title<T: ToString>(title: T) -> Markup {
    html! {
        div class="col-md m-3 h2 d-flex align-items-center" {
            h1 { (title.to_string()) }
        }
    }
}

/// An inline form error, rendered only when there is one.
pub fn form_error(error: Option<&str>) -> Markup {
    html! {
        @if let Some(err) = error {
            div class="alert alert-danger" role="alert" {
                (err)
            }
        }
    }
}

pub fn format_datetime(t: &NaiveDateTime) -> String {
    t.format("%d %b %Y, %H:%M").to_string()
}

/// A green/red table cell for boolean columns.
pub fn bool_cell(value: bool, yes: &str, no: &str) -> Markup {
    html! {
        @if value {
            td class="table-success" { (yes) }
        } @else {
            td class="table-danger" { (no) }
        }
    }
}
