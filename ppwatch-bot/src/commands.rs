//! Bot command parsing and reply rendering.
//!
//! Parsing is a pure function over the message words so it can be tested
//! without an IRC connection. In channels the bot answers to
//! `!<command_name> <subcommand> ...`; in private messages the subcommand
//! comes bare. With a channel context, `subscribe <url>` targets the current
//! channel; the two-argument form names the channel explicitly.

use ppwatch_core::rules::RuleSet;

/// A parsed bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    /// List subscriptions, for one channel or all of them.
    List { channel: Option<String> },
    Subscribe { channel: String, url: String },
    Unsubscribe { channel: String, url: String },
    /// Recognized subcommand with bad arguments; the reply is a usage line.
    Usage(&'static str),
}

/// Parse the words of a command, after any `!<command_name>` prefix.
///
/// `channel_context` is the channel the message arrived in, `None` for
/// private messages. Unrecognized subcommands return `None` and are ignored.
pub fn parse_command(words: &[&str], channel_context: Option<&str>) -> Option<BotCommand> {
    match words.first().copied() {
        None | Some("help") => Some(BotCommand::Help),

        Some("list") => Some(BotCommand::List {
            channel: channel_context.map(str::to_string),
        }),

        Some("subscribe") => Some(parse_target(words, channel_context, true)),
        Some("unsubscribe") => Some(parse_target(words, channel_context, false)),

        Some(_) => None,
    }
}

fn parse_target(words: &[&str], channel_context: Option<&str>, subscribe: bool) -> BotCommand {
    let (channel, url) = match (words.get(1), words.get(2), channel_context) {
        // Explicit channel always wins.
        (Some(channel), Some(url), _) if channel.starts_with('#') => {
            (channel.to_string(), url.to_string())
        }
        // Single argument inside a channel targets that channel.
        (Some(url), None, Some(context)) => (context.to_string(), url.to_string()),
        _ => {
            return BotCommand::Usage(if subscribe {
                "Usage: subscribe <channel> <url>"
            } else {
                "Usage: unsubscribe <channel> <url>"
            });
        }
    };

    if subscribe {
        BotCommand::Subscribe { channel, url }
    } else {
        BotCommand::Unsubscribe { channel, url }
    }
}

/// The help reply.
pub fn help_lines(command_name: &str) -> Vec<String> {
    vec![
        format!("=== {} Bot Commands ===", command_name.to_uppercase()),
        "  help - Show this help".to_string(),
        "  list - Show subscriptions".to_string(),
        "  subscribe <channel> <url> - Subscribe a channel to feed updates".to_string(),
        "  unsubscribe <channel> <url> - Unsubscribe".to_string(),
    ]
}

/// The `list` reply for one channel or the whole rule set.
pub fn render_list(rules: &RuleSet, channel: Option<&str>) -> Vec<String> {
    match channel {
        Some(channel) => match rules.rules_for(channel) {
            None => vec![format!("No subscriptions for {channel}")],
            Some(channel_rules) => {
                let mut lines = vec![format!(
                    "Monitoring {} feed(s) for {channel}:",
                    channel_rules.len()
                )];
                lines.extend(
                    channel_rules
                        .iter()
                        .map(|rule| format!("  {} ({})", rule.pattern(), rule.kind())),
                );
                lines
            }
        },
        None => {
            if rules.is_empty() {
                return vec!["No subscriptions configured".to_string()];
            }
            let mut lines = vec![format!("Subscriptions ({} channels):", rules.len())];
            for (channel, channel_rules) in rules.iter() {
                lines.push(format!("  {channel}: {} feed(s)", channel_rules.len()));
                lines.extend(
                    channel_rules
                        .iter()
                        .map(|rule| format!("    {} ({})", rule.pattern(), rule.kind())),
                );
            }
            lines
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ppwatch_core::rules::RuleSpec;

    #[test]
    fn bare_and_help_both_mean_help() {
        assert_eq!(parse_command(&[], None), Some(BotCommand::Help));
        assert_eq!(parse_command(&["help"], Some("#pods")), Some(BotCommand::Help));
    }

    #[test]
    fn list_carries_channel_context() {
        assert_eq!(
            parse_command(&["list"], Some("#pods")),
            Some(BotCommand::List {
                channel: Some("#pods".to_string())
            })
        );
        assert_eq!(
            parse_command(&["list"], None),
            Some(BotCommand::List { channel: None })
        );
    }

    #[test]
    fn subscribe_with_explicit_channel() {
        assert_eq!(
            parse_command(&["subscribe", "#pods", "https://a.example/f.xml"], None),
            Some(BotCommand::Subscribe {
                channel: "#pods".to_string(),
                url: "https://a.example/f.xml".to_string(),
            })
        );
    }

    #[test]
    fn subscribe_in_channel_defaults_to_that_channel() {
        assert_eq!(
            parse_command(&["subscribe", "https://a.example/f.xml"], Some("#pods")),
            Some(BotCommand::Subscribe {
                channel: "#pods".to_string(),
                url: "https://a.example/f.xml".to_string(),
            })
        );
    }

    #[test]
    fn subscribe_without_enough_arguments_is_usage() {
        assert!(matches!(
            parse_command(&["subscribe"], None),
            Some(BotCommand::Usage(_))
        ));
        assert!(matches!(
            parse_command(&["unsubscribe", "https://a.example/f.xml"], None),
            Some(BotCommand::Usage(_))
        ));
    }

    #[test]
    fn unknown_subcommand_is_ignored() {
        assert_eq!(parse_command(&["dance"], None), None);
    }

    #[test]
    fn list_rendering_covers_both_scopes() {
        let mut rules = RuleSet::new();
        rules
            .subscribe("#pods", RuleSpec::exact("https://a.example/f.xml"))
            .unwrap();

        let all = render_list(&rules, None);
        assert_eq!(all[0], "Subscriptions (1 channels):");
        assert!(all[2].contains("https://a.example/f.xml"));

        let one = render_list(&rules, Some("#pods"));
        assert_eq!(one[0], "Monitoring 1 feed(s) for #pods:");

        let missing = render_list(&rules, Some("#other"));
        assert_eq!(missing, vec!["No subscriptions for #other".to_string()]);
    }
}
