//! IRC connection, message delivery, and command handling.
//!
//! The bot joins every configured channel, identifies with NickServ when a
//! password is set, and then serves two sources concurrently:
//! - `OutboundMessage`s from the dispatcher, paced by `message.delay_ms`
//! - incoming `!<command_name>` commands from channels and private messages
//!
//! Outgoing messages (announcements and command replies alike) go through
//! an [`Outbox`] drained by a timer arm of the select loop. Pacing must
//! never block the loop itself: the server stream has to keep being polled
//! while a backlog drains, or PINGs go unanswered and the server drops the
//! connection.

use anyhow::Context as _;
use futures_util::StreamExt;
use irc::client::prelude::{Client, Command, Config, Message};
use ppwatch_core::events::{OutboundMessage, OutboundMessageReceiver};
use ppwatch_core::rules::{RuleSet, RuleSpec};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::commands::{help_lines, parse_command, render_list, BotCommand};
use crate::config::FileConfig;

pub struct IrcBot {
    client: Client,
    rules: Arc<RwLock<RuleSet>>,
    command_name: String,
    allow_runtime_subscriptions: bool,
    authorized_users: Vec<String>,
    message_delay: Duration,
}

impl IrcBot {
    /// Connect to the IRC server described by the configuration.
    ///
    /// The channels joined at startup are the filter channels; runtime
    /// subscriptions join their channel on demand.
    pub async fn connect(
        config: &FileConfig,
        rules: Arc<RwLock<RuleSet>>,
    ) -> anyhow::Result<Self> {
        let channels = {
            let rules = rules.read().await;
            rules.channels().map(str::to_string).collect::<Vec<_>>()
        };

        let irc_config = Config {
            server: Some(config.irc.host.clone()),
            port: Some(config.irc.port),
            use_tls: Some(config.irc.secure),
            nickname: Some(config.irc.nick.clone()),
            username: Some(config.irc.user.clone()),
            realname: Some(config.irc.realname.clone()),
            nick_password: config.irc.nickserv_password.clone(),
            channels,
            ..Config::default()
        };

        let client = Client::from_config(irc_config)
            .await
            .with_context(|| format!("connecting to {}:{}", config.irc.host, config.irc.port))?;

        Ok(Self {
            client,
            rules,
            command_name: config.command_name.clone(),
            allow_runtime_subscriptions: config.allow_runtime_subscriptions,
            authorized_users: config.authorized_users.clone(),
            message_delay: Duration::from_millis(config.message.delay_ms),
        })
    }

    /// Run the bot until shutdown is signaled or the connection drops.
    pub async fn run(
        mut self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut outbound_rx: OutboundMessageReceiver,
    ) -> anyhow::Result<()> {
        self.client.identify().context("IRC registration failed")?;
        let mut stream = self.client.stream()?;
        let mut outbox = Outbox::new();

        info!("IRC bot started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("IRC bot received shutdown signal");
                        let _ = self.client.send_quit("shutting down");
                        break;
                    }
                }

                // Paced drain. The sleep races the other arms, so the
                // stream keeps being polled while a backlog empties.
                _ = tokio::time::sleep_until(outbox.deadline()), if !outbox.is_empty() => {
                    if let Some(message) = outbox.pop(Instant::now(), self.message_delay) {
                        self.send(&message.channel, &message.body);
                    }
                }

                message = stream.next() => match message {
                    Some(Ok(message)) => self.handle_message(message, &mut outbox).await,
                    Some(Err(e)) => return Err(e).context("IRC connection error"),
                    None => {
                        info!("IRC stream closed");
                        break;
                    }
                },

                Some(outbound) = outbound_rx.recv() => {
                    outbox.push(outbound.channel, outbound.body);
                }
            }
        }

        info!("IRC bot shutdown complete");
        Ok(())
    }

    /// Send one queued message. Channel targets are resolved against the
    /// joined channel list; nick targets go out as-is.
    fn send(&self, target: &str, body: &str) {
        let target = if target.starts_with('#') {
            let joined = self.client.list_channels().unwrap_or_default();
            match find_joined_target(&joined, target) {
                Some(joined_target) => joined_target.to_string(),
                None => {
                    warn!(channel = %target, "Not in channel, skipping notification");
                    return;
                }
            }
        } else {
            target.to_string()
        };

        if let Err(e) = self.client.send_privmsg(&target, body) {
            error!(%target, error = %e, "Failed to send message");
        }
    }

    async fn handle_message(&self, message: Message, outbox: &mut Outbox) {
        let Some(nick) = message.source_nickname().map(str::to_string) else {
            return;
        };

        let Command::PRIVMSG(target, text) = &message.command else {
            return;
        };

        let (context, body) = if target.starts_with('#') {
            // Channel commands need the `!<command_name>` prefix.
            let prefix = format!("!{}", self.command_name);
            match text.strip_prefix(&prefix) {
                Some(rest) if rest.is_empty() || rest.starts_with(' ') => {
                    (Some(target.as_str()), rest)
                }
                _ => return,
            }
        } else {
            (None, text.as_str())
        };

        let words = body.split_whitespace().collect::<Vec<_>>();
        let Some(command) = parse_command(&words, context) else {
            return;
        };

        debug!(%nick, ?command, "Handling bot command");
        self.run_command(&nick, command, outbox).await;
    }

    /// Execute a command; replies are queued on the outbox, never sent
    /// inline, so long replies get the same pacing as announcements.
    async fn run_command(&self, nick: &str, command: BotCommand, outbox: &mut Outbox) {
        match command {
            BotCommand::Help => {
                for line in help_lines(&self.command_name) {
                    outbox.push(nick.to_string(), line);
                }
            }

            BotCommand::List { channel } => {
                let lines = {
                    let rules = self.rules.read().await;
                    render_list(&rules, channel.as_deref())
                };
                for line in lines {
                    outbox.push(nick.to_string(), line);
                }
            }

            BotCommand::Subscribe { channel, url } => {
                if !self.is_authorized(nick) {
                    self.push_unauthorized(nick, "subscribe", outbox);
                    return;
                }
                let added = {
                    let mut rules = self.rules.write().await;
                    rules.subscribe(&channel, RuleSpec::exact(&url))
                };
                let reply = match added {
                    Ok(true) => {
                        info!(%channel, %url, by = %nick, "Subscription added");
                        self.join_if_needed(&channel);
                        format!("Now monitoring {url} in {channel}")
                    }
                    Ok(false) => format!("Already monitoring {url} in {channel}"),
                    Err(e) => format!("Error: {e}"),
                };
                outbox.push(nick.to_string(), reply);
            }

            BotCommand::Unsubscribe { channel, url } => {
                if !self.is_authorized(nick) {
                    self.push_unauthorized(nick, "unsubscribe", outbox);
                    return;
                }
                let removed = {
                    let mut rules = self.rules.write().await;
                    rules.unsubscribe(&channel, &url)
                };
                let reply = if removed {
                    info!(%channel, %url, by = %nick, "Subscription removed");
                    format!("Stopped monitoring {url} in {channel}")
                } else {
                    format!("Not monitoring {url} in {channel}")
                };
                outbox.push(nick.to_string(), reply);
            }

            BotCommand::Usage(usage) => {
                outbox.push(nick.to_string(), usage.to_string());
            }
        }
    }

    /// Both the master switch and the per-user list must allow it.
    fn is_authorized(&self, nick: &str) -> bool {
        self.allow_runtime_subscriptions && self.authorized_users.iter().any(|user| user == nick)
    }

    fn join_if_needed(&self, channel: &str) {
        let joined = self.client.list_channels().unwrap_or_default();
        if find_joined_target(&joined, channel).is_none() {
            if let Err(e) = self.client.send_join(channel) {
                error!(%channel, error = %e, "Failed to join channel");
            }
        }
    }

    fn push_unauthorized(&self, nick: &str, action: &str, outbox: &mut Outbox) {
        warn!(%nick, %action, "Unauthorized subscription management attempt");
        outbox.push(
            nick.to_string(),
            "Unauthorized: subscriptions disabled or user not authorized".to_string(),
        );
    }
}

/// Queue of outgoing messages with a send deadline for pacing.
///
/// `pop` hands out at most one message per `delay`; between deadlines it
/// returns `None`, leaving the select loop free to serve the stream.
struct Outbox {
    queue: VecDeque<OutboundMessage>,
    next_send: Instant,
}

impl Outbox {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            next_send: Instant::now(),
        }
    }

    fn push(&mut self, target: String, body: String) {
        self.queue.push_back(OutboundMessage {
            channel: target,
            body,
        });
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// When the next message may be sent.
    fn deadline(&self) -> Instant {
        self.next_send
    }

    /// The next message, if its deadline has passed. A successful pop
    /// moves the deadline forward by `delay`.
    fn pop(&mut self, now: Instant, delay: Duration) -> Option<OutboundMessage> {
        if now < self.next_send {
            return None;
        }
        let message = self.queue.pop_front()?;
        self.next_send = now + delay;
        Some(message)
    }
}

/// The joined channel matching `channel`, IRC-case-insensitively.
fn find_joined_target<'a>(joined: &'a [String], channel: &str) -> Option<&'a str> {
    joined
        .iter()
        .find(|name| name.eq_ignore_ascii_case(channel))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_target_lookup_is_case_insensitive() {
        let joined = vec!["#Podcasts".to_string(), "#live".to_string()];
        assert_eq!(find_joined_target(&joined, "#podcasts"), Some("#Podcasts"));
        assert_eq!(find_joined_target(&joined, "#LIVE"), Some("#live"));
        assert_eq!(find_joined_target(&joined, "#other"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn outbox_hands_out_one_message_per_delay() {
        let delay = Duration::from_secs(1);
        let start = Instant::now();
        let mut outbox = Outbox::new();
        outbox.push("#pods".to_string(), "first".to_string());
        outbox.push("#pods".to_string(), "second".to_string());

        let first = outbox.pop(start, delay).expect("first message is due");
        assert_eq!(first.body, "first");

        // The second message is held until the delay elapses; the queue
        // never blocks, it just answers None.
        assert!(outbox.pop(start, delay).is_none());
        assert!(outbox.pop(start + delay / 2, delay).is_none());
        assert_eq!(outbox.deadline(), start + delay);

        let second = outbox.pop(start + delay, delay).expect("second is due");
        assert_eq!(second.body, "second");
        assert!(outbox.is_empty());
    }

    #[test]
    fn empty_outbox_pops_nothing_and_keeps_deadline_usable() {
        let delay = Duration::from_millis(500);
        let mut outbox = Outbox::new();
        assert!(outbox.is_empty());
        assert!(outbox.pop(Instant::now(), delay).is_none());

        // A message pushed after idle time is due immediately.
        let later = Instant::now() + Duration::from_secs(60);
        outbox.push("nick".to_string(), "hello".to_string());
        assert!(outbox.pop(later, delay).is_some());
    }
}
