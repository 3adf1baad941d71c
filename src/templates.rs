//! Email subject and body rendering for accepted submissions.

use std::fmt::Write;

use crate::models::{EmailMessage, Submission};
use crate::validation::escape_html;

/// Sender and recipient used for studio notifications.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub from: String,
    pub inbox: String,
}

pub fn render(submission: &Submission, mailbox: &Mailbox) -> EmailMessage {
    let (subject, rows, body) = match submission {
        Submission::Contact(c) => (
            match &c.subject {
                Some(s) => format!("[Contact] {s}"),
                None => format!("[Contact] New message from {}", c.name),
            },
            vec![
                ("Name", c.name.clone()),
                ("Email", c.email.clone()),
                ("Company", c.company.clone().unwrap_or_default()),
                ("Topic", c.topic.clone()),
            ],
            Some(c.message.as_str()),
        ),
        Submission::Newsletter(s) => (
            "[Newsletter] New subscriber".to_string(),
            vec![
                ("Email", s.email.clone()),
                ("Name", s.name.clone().unwrap_or_default()),
                ("Source", s.source.clone().unwrap_or_default()),
            ],
            None,
        ),
        Submission::Inquiry(i) => (
            format!("[Project inquiry] {} ({})", i.name, i.project_type),
            vec![
                ("Name", i.name.clone()),
                ("Email", i.email.clone()),
                ("Company", i.company.clone().unwrap_or_default()),
                ("Project type", i.project_type.clone()),
                ("Budget", i.budget.clone()),
                ("Timeline", i.timeline.clone()),
            ],
            Some(i.description.as_str()),
        ),
    };

    let rows: Vec<(&str, String)> = rows.into_iter().filter(|(_, v)| !v.is_empty()).collect();

    let mut text = String::new();
    let mut html = String::from("<table>");
    for (label, value) in &rows {
        let _ = writeln!(text, "{label}: {value}");
        let _ = write!(
            html,
            "<tr><th align=\"left\">{label}</th><td>{}</td></tr>",
            escape_html(value)
        );
    }
    html.push_str("</table>");
    if let Some(body) = body {
        let _ = write!(text, "\n{body}\n");
        let _ = write!(
            html,
            "<p>{}</p>",
            escape_html(body).replace('\n', "<br>")
        );
    }

    // newsletter sign-ups are not conversations
    let reply_to = match submission {
        Submission::Newsletter(_) => None,
        _ => Some(submission.submitter_email().to_string()),
    };

    EmailMessage {
        from: mailbox.from.clone(),
        to: vec![mailbox.inbox.clone()],
        reply_to,
        subject,
        text,
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, Subscription};

    fn mailbox() -> Mailbox {
        Mailbox {
            from: "Studio Website <forms@studio.example>".into(),
            inbox: "hello@studio.example".into(),
        }
    }

    #[test]
    fn contact_email_replies_to_submitter_and_escapes_html() {
        let submission = Submission::Contact(Contact {
            name: "Ada <b>".into(),
            email: "ada@example.com".into(),
            company: None,
            subject: None,
            message: "Hello\n<script>x</script>".into(),
            topic: "general".into(),
        });
        let msg = render(&submission, &mailbox());

        assert_eq!(msg.to, vec!["hello@studio.example".to_string()]);
        assert_eq!(msg.reply_to.as_deref(), Some("ada@example.com"));
        assert_eq!(msg.subject, "[Contact] New message from Ada <b>");
        assert!(msg.text.contains("Hello\n<script>x</script>"));
        assert!(!msg.text.contains("Company"));
        assert!(msg.html.contains("Ada &lt;b&gt;"));
        assert!(msg.html.contains("Hello<br>&lt;script&gt;"));
        assert!(!msg.html.contains("<script>"));
    }

    #[test]
    fn newsletter_email_has_no_reply_to() {
        let submission = Submission::Newsletter(Subscription {
            email: "reader@example.com".into(),
            name: None,
            source: Some("blog".into()),
        });
        let msg = render(&submission, &mailbox());
        assert_eq!(msg.reply_to, None);
        assert_eq!(msg.subject, "[Newsletter] New subscriber");
        assert!(msg.text.contains("Source: blog"));
    }
}
