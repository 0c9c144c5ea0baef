//! Sends emails.
//!
//! Debug builds only log what would have been sent. Release builds deliver
//! through the SMTP relay named by `SMTP_HOST` (with `SMTP_USERNAME`,
//! `SMTP_PASSWORD` and `SMTP_DOMAIN`) in a background task, and record the
//! message id of every delivered email.
use std::sync::Arc;

use db::DbConn;

/// An email to one or more `(name, address)` recipients.
#[derive(Debug, Clone)]
pub struct Mail {
    pub to: Vec<(String, String)>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl Mail {
    pub fn recipients(&self) -> String {
        self.to
            .iter()
            .map(|(name, email)| format!("{name} <{email}>"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(debug_assertions)]
pub fn send_mail(mail: Mail, _db: Arc<DbConn>) {
    tracing::info!(
        to = %mail.recipients(),
        subject = %mail.subject,
        "not sending email in a debug build"
    );
}

#[cfg(not(debug_assertions))]
pub fn send_mail(mail: Mail, db: Arc<DbConn>) {
    rocket::tokio::spawn(async move {
        if let Err(e) = deliver(mail, db).await {
            tracing::error!(error = %e, "failed to send email");
        }
    });
}

#[allow(unused)]
async fn deliver(
    mail: Mail,
    db: Arc<DbConn>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use db::schema::emails;
    use diesel::prelude::*;
    use lettre::{
        message::{header::ContentType, MultiPart, SinglePart},
        transport::smtp::authentication::Credentials,
        AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    };
    use uuid::Uuid;

    let env = |key: &str| {
        std::env::var(key).map_err(|_| format!("{key} is not set"))
    };

    let mut msg = Message::builder();
    for (name, email) in &mail.to {
        msg = msg.to(format!("{name} <{email}>").parse()?);
    }

    let domain = env("SMTP_DOMAIN")?;
    let msg_id = format!("{}@{}", Uuid::now_v7(), domain);

    let msg = msg
        .from(format!("noreply@{domain}").parse()?)
        .subject(&mail.subject)
        .message_id(Some(msg_id.clone()))
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .content_type(ContentType::TEXT_PLAIN)
                        .body(mail.text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .content_type(ContentType::TEXT_HTML)
                        .body(mail.html.clone()),
                ),
        )?;

    let mailer: AsyncSmtpTransport<Tokio1Executor> =
        AsyncSmtpTransport::<Tokio1Executor>::relay(&env("SMTP_HOST")?)?
            .credentials(Credentials::new(
                env("SMTP_USERNAME")?,
                env("SMTP_PASSWORD")?,
            ))
            .build();

    mailer.send(msg).await?;

    let recipients = mail.recipients();
    db.run(move |conn| {
        diesel::insert_into(emails::table)
            .values((
                emails::message_id.eq(&msg_id),
                emails::recipients.eq(recipients),
                emails::created_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
    })
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Mail;

    #[test]
    fn recipients_are_comma_separated_mailboxes() {
        let mail = Mail {
            to: vec![
                ("Asha".to_string(), "asha@example.com".to_string()),
                ("Ravi".to_string(), "ravi@example.com".to_string()),
            ],
            subject: String::new(),
            html: String::new(),
            text: String::new(),
        };
        assert_eq!(
            mail.recipients(),
            "Asha <asha@example.com>,Ravi <ravi@example.com>"
        );
    }
}
