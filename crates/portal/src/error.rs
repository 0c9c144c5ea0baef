use rocket::{
    http::Status,
    response::{self, Responder},
    Request,
};
use ui::error_page;

/// Failures a handler cannot recover from by re-rendering its form.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("payment gateway error: {0}")]
    Payment(#[from] payments::Error),
    #[error("could not store the uploaded file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not hash password: {0}")]
    PasswordHash(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn not_found(what: &str) -> Error {
        Error::NotFound(format!("No such {what}."))
    }

    pub fn status(&self) -> Status {
        match self {
            Error::Database(_) | Error::Io(_) | Error::PasswordHash(_) => {
                Status::InternalServerError
            }
            Error::Payment(_) => Status::BadGateway,
            Error::NotFound(_) => Status::NotFound,
            Error::Forbidden(_) => Status::Forbidden,
        }
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let page = match &self {
            Error::NotFound(msg) => {
                error_page(404, "Not found", Some(msg), None)
            }
            Error::Forbidden(msg) => {
                error_page(403, "Forbidden", Some(msg), None)
            }
            Error::Payment(e) => {
                tracing::error!(error = %e, "payment gateway request failed");
                error_page(
                    502,
                    "Payment gateway unavailable",
                    Some("We could not reach the payment gateway. You have not been charged; please try again shortly."),
                    None,
                )
            }
            Error::Database(e) => {
                tracing::error!(error = %e, "database error");
                error_page(500, "Something went wrong", None::<String>, None)
            }
            Error::Io(_) | Error::PasswordHash(_) => {
                tracing::error!(error = %self, "internal error");
                error_page(500, "Something went wrong", None::<String>, None)
            }
        };
        (status, page).respond_to(req)
    }
}
