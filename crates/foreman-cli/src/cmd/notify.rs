use crate::output::print_json;
use anyhow::anyhow;
use foreman_core::notify::{Notification, Notify, NotifyOutcome, NotifyStatus, SlackNotifier};

/// Never fails on delivery; only malformed arguments are errors.
pub fn run(
    title: &str,
    message: &str,
    status: &str,
    fields: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let status: NotifyStatus = status.parse().map_err(|e: String| anyhow!(e))?;
    let mut notification = Notification::new(title, message, status);
    for field in fields {
        let (k, v) = parse_field(field)?;
        notification = notification.field(k, v);
    }

    let outcome = SlackNotifier::from_env().notify(&notification);
    if json {
        print_json(&outcome)?;
    } else {
        match &outcome {
            NotifyOutcome::Sent => println!("Notification sent."),
            NotifyOutcome::Skipped => println!("No webhook configured; notification skipped."),
            NotifyOutcome::Failed(e) => println!("Notification failed: {e}"),
        }
    }
    Ok(())
}

fn parse_field(raw: &str) -> anyhow::Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| anyhow!("invalid --field '{raw}': expected key=value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_splits_on_first_equals() {
        assert_eq!(parse_field("pr=https://x/y?a=b").unwrap(), ("pr", "https://x/y?a=b"));
        assert_eq!(parse_field(" task = T-1 ").unwrap(), ("task", "T-1"));
    }

    #[test]
    fn field_without_key_is_rejected() {
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=v").is_err());
    }
}
