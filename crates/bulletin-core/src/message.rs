//! HTML email templates.
//!
//! Every interpolated value is escaped, including the links, since names and
//! campaign text come from outside the system.

use quick_xml::escape::escape;

use crate::{content::Campaign, subscriber::Subscriber, token::Token};

/// A rendered email, ready for a [`crate::mail::MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
  pub subject:   String,
  pub html_body: String,
}

pub fn confirmation_link(base_url: &str, token: &Token) -> String {
  format!("{}/newsletter/confirm/{token}", base_url.trim_end_matches('/'))
}

pub fn unsubscribe_link(base_url: &str, token: &Token) -> String {
  format!("{}/newsletter/unsubscribe/{token}", base_url.trim_end_matches('/'))
}

fn greeting(subscriber: &Subscriber) -> String {
  match subscriber.display_name() {
    Some(name) => format!("Hi {},", escape(name)),
    None => "Hi,".to_owned(),
  }
}

fn unsubscribe_footer(subscriber: &Subscriber, base_url: &str) -> String {
  let link = unsubscribe_link(base_url, &subscriber.unsubscribe_token);
  format!(
    r#"<p style="font-size:small">Don't want these emails? <a href="{}">Unsubscribe</a>.</p>"#,
    escape(link.as_str())
  )
}

/// The double opt-in message.
pub fn confirmation(subscriber: &Subscriber, base_url: &str) -> Message {
  let link = confirmation_link(base_url, &subscriber.confirmation_token);
  let html_body = format!(
    r#"<div>
  <p>{greeting}</p>
  <p>Please confirm your newsletter subscription by clicking <a href="{link}">this link</a>.</p>
  <p>If you did not sign up, you can ignore this email.</p>
</div>"#,
    greeting = greeting(subscriber),
    link = escape(link.as_str()),
  );
  Message {
    subject: "Please confirm your newsletter subscription".to_owned(),
    html_body,
  }
}

/// Sent once, on the first successful confirmation.
pub fn welcome(subscriber: &Subscriber, base_url: &str) -> Message {
  let html_body = format!(
    r#"<div>
  <p>{greeting}</p>
  <p>Your subscription is confirmed. Welcome to the newsletter!</p>
  {footer}
</div>"#,
    greeting = greeting(subscriber),
    footer = unsubscribe_footer(subscriber, base_url),
  );
  Message {
    subject: "Welcome to the newsletter".to_owned(),
    html_body,
  }
}

/// A campaign message personalised with the recipient's own unsubscribe link.
pub fn campaign(campaign: &Campaign, subscriber: &Subscriber, base_url: &str) -> Message {
  let image = campaign
    .image
    .as_deref()
    .map(|src| {
      format!(
        r#"<img src="{}" alt="{}" style="max-width:100%">"#,
        escape(src),
        escape(campaign.title.as_str())
      )
    })
    .unwrap_or_default();
  let html_body = format!(
    r#"<div>
  <p>{greeting}</p>
  <h1>{title}</h1>
  {image}
  <p>{description}</p>
  <p><a href="{link}">Read more</a></p>
  {footer}
</div>"#,
    greeting = greeting(subscriber),
    title = escape(campaign.title.as_str()),
    description = escape(campaign.description.as_str()),
    link = escape(campaign.link.as_str()),
    footer = unsubscribe_footer(subscriber, base_url),
  );
  Message {
    subject: campaign.title.clone(),
    html_body,
  }
}
