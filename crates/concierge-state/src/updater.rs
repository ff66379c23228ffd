// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic slot extraction from conversation turns.
//!
//! The updater is a pure function of `(state, incoming turns, config)`. It
//! merges the turns into the transcript, re-extracts contact details and an
//! explicit `ID: X` focus, and recomputes the confirmation flag from the
//! latest user utterance alone.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use concierge_config::model::StateConfig;
use concierge_core::ChatTurn;
use regex::Regex;
use tracing::debug;

use crate::state::{ConversationState, PinnedEntity, slot};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}").unwrap()
});

static EXPLICIT_EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:e-?mail(?:\s+address)?\s*(?:is|:|：)|邮箱(?:是|为|：|:)?)\s*([A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,})",
    )
    .unwrap()
});

static EXPLICIT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:\bmy\s+name\s+is|\bname\s*(?:is|:)|\bcall\s+me)\s+([A-Za-z][A-Za-z'\-]*(?:\s+[A-Z][A-Za-z'\-]*)?)",
    )
    .unwrap()
});

static ZH_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:我叫|我的名字是|我是)\s*(\p{Han}{1,4})").unwrap()
});

// Case-sensitive on purpose: "I am looking" must not yield a name.
static SELF_INTRO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:I\s+am|I'm|[Tt]his\s+is)\s+([A-Z][a-z'\-]+(?:\s+[A-Z][a-z'\-]+)?)").unwrap()
});

static FOCUS_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bID\s*[:：]\s*([A-Za-z0-9][A-Za-z0-9_\-]*)").unwrap()
});

const NOT_NAMES: &[&str] = &["Interested", "Looking", "Not", "Just", "From", "Here", "Sure", "Fine"];

const SUMMARY_LINE_MAX: usize = 200;

fn builtin(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(locale, words)| {
            (
                locale.to_string(),
                words.iter().map(|w| w.to_string()).collect(),
            )
        })
        .collect()
}

fn builtin_strong() -> BTreeMap<String, Vec<String>> {
    builtin(&[
        (
            "en",
            &["send it", "confirm send", "confirm", "please send", "go ahead and send"],
        ),
        ("zh", &["发送", "确认发送"]),
    ])
}

fn builtin_weak() -> BTreeMap<String, Vec<String>> {
    builtin(&[
        ("en", &["yes", "ok", "okay", "sure", "please do"]),
        ("zh", &["好", "是的", "可以"]),
    ])
}

fn flatten(lists: BTreeMap<String, Vec<String>>) -> Vec<String> {
    lists
        .into_values()
        .flatten()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether `keyword` occurs in `text`. ASCII keywords must sit on word
/// boundaries ("ok" does not match "book"); others match as substrings.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(keyword).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + keyword.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

pub struct StateUpdater {
    recent_turns: usize,
    summary_max_chars: usize,
    confirmation_slot: String,
    strong: Vec<String>,
    weak: Vec<String>,
    closure: Vec<String>,
}

impl StateUpdater {
    pub fn new(config: &StateConfig, summary_max_chars: usize) -> Self {
        Self {
            recent_turns: config.recent_turns.max(1),
            summary_max_chars,
            confirmation_slot: config.confirmation_slot.clone(),
            strong: flatten(
                config
                    .confirm_keywords_strong
                    .clone()
                    .unwrap_or_else(builtin_strong),
            ),
            weak: flatten(
                config
                    .confirm_keywords_weak
                    .clone()
                    .unwrap_or_else(builtin_weak),
            ),
            closure: config
                .closure_keywords
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn confirmation_slot(&self) -> &str {
        &self.confirmation_slot
    }

    /// Confirmation verdict for a single user utterance.
    pub fn is_confirmation(&self, utterance: &str) -> bool {
        let text = utterance.trim().to_lowercase();
        if text.is_empty() {
            return false;
        }
        if self.closure.iter().any(|k| contains_keyword(&text, k)) {
            return false;
        }
        if self.strong.iter().any(|k| contains_keyword(&text, k)) {
            return true;
        }
        let mentions_send = contains_keyword(&text, "send") || text.contains('发');
        mentions_send && self.weak.iter().any(|k| contains_keyword(&text, k))
    }

    /// Apply incoming turns to `state`.
    ///
    /// `incoming` may be the full client-side history or only the new turns;
    /// any prefix that repeats the stored tail is not applied twice.
    pub fn apply(&self, mut state: ConversationState, incoming: &[ChatTurn]) -> ConversationState {
        let fresh = new_turns(&state.recent_turns, incoming);
        let user_texts: Vec<&str> = fresh
            .iter()
            .filter(|t| t.is_user())
            .map(|t| t.text.as_str())
            .collect();

        if let Some(email) = extract_email(&user_texts) {
            state.slots.set(slot::EMAIL, email);
        }
        if let Some(name) = extract_name(&user_texts) {
            state.slots.set(slot::NAME, name);
        }
        if let Some(id) = extract_focus_id(&user_texts) {
            debug!(conversation_id = %state.id, product_id = %id, "explicit id mention pins product");
            state.pin(PinnedEntity::new(id, ""));
        }

        self.record(&mut state, fresh);

        let latest_user = state
            .recent_turns
            .iter()
            .rev()
            .find(|t| t.is_user())
            .map(|t| t.text.as_str())
            .unwrap_or_default();
        let confirmed = self.is_confirmation(latest_user);
        state.slots.set(self.confirmation_slot.clone(), confirmed);
        state
    }

    /// Append turns produced by the engine itself (replies, tool feedback).
    /// Turns pushed out of the recent window are folded into the summary.
    pub fn record(&self, state: &mut ConversationState, turns: &[ChatTurn]) {
        state.recent_turns.extend_from_slice(turns);
        if state.recent_turns.len() > self.recent_turns {
            let drop = state.recent_turns.len() - self.recent_turns;
            let dropped: Vec<ChatTurn> = state.recent_turns.drain(..drop).collect();
            self.fold_into_summary(&mut state.summary, &dropped);
        }
    }

    fn fold_into_summary(&self, summary: &mut String, dropped: &[ChatTurn]) {
        for turn in dropped {
            let text: String = turn.text.split_whitespace().collect::<Vec<_>>().join(" ");
            let text: String = text.chars().take(SUMMARY_LINE_MAX).collect();
            if !summary.is_empty() {
                summary.push('\n');
            }
            summary.push_str(&format!("{}: {}", turn.role, text));
        }
        let limit = self.summary_max_chars.saturating_mul(2).max(1);
        let count = summary.chars().count();
        if count > limit {
            let tail: String = summary.chars().skip(count - limit).collect();
            *summary = tail;
        }
    }
}

/// The part of `incoming` not already recorded in `existing`.
///
/// Alignment is anchored on user turns only. Stored assistant and tool
/// feedback turns never match byte for byte what the client echoes back,
/// so turns that follow an already-stored user turn are skipped up to the
/// next user turn. A trailing user turn is always new. Clients may resend
/// their whole history or a short window that starts inside the stored tail.
pub fn new_turns<'a>(existing: &[ChatTurn], incoming: &'a [ChatTurn]) -> &'a [ChatTurn] {
    if existing.is_empty() {
        return incoming;
    }
    let stored: Vec<&str> = existing
        .iter()
        .filter(|t| t.is_user())
        .map(|t| t.text.as_str())
        .collect();
    let users: Vec<usize> = incoming
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_user())
        .map(|(i, _)| i)
        .collect();
    let searchable = if incoming.last().is_some_and(ChatTurn::is_user) {
        users.len() - 1
    } else {
        users.len()
    };
    let matches = |end: usize, tail: &[&str]| {
        users[end - tail.len()..end]
            .iter()
            .zip(tail)
            .all(|(&i, text)| incoming[i].text == *text)
    };

    for width in (1..=stored.len().min(searchable)).rev() {
        let tail = &stored[stored.len() - width..];
        // A partial tail only counts when it opens the window.
        let anchored = if width == stored.len() {
            (width..=searchable).rev().find(|&end| matches(end, tail))
        } else {
            matches(width, tail).then_some(width)
        };
        if let Some(end) = anchored {
            let next_user = users.get(end).copied().unwrap_or(incoming.len());
            return &incoming[next_user..];
        }
    }

    let echoed = incoming
        .iter()
        .take_while(|t| !t.is_user() && existing.contains(t))
        .count();
    &incoming[echoed..]
}

fn extract_email(texts: &[&str]) -> Option<String> {
    let explicit = texts
        .iter()
        .rev()
        .find_map(|t| EXPLICIT_EMAIL_RE.captures_iter(t).last())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    explicit.or_else(|| {
        texts
            .iter()
            .rev()
            .find_map(|t| EMAIL_RE.find_iter(t).last())
            .map(|m| m.as_str().to_string())
    })
}

fn extract_name(texts: &[&str]) -> Option<String> {
    let pick = |re: &Regex| {
        texts
            .iter()
            .rev()
            .find_map(|t| {
                re.captures_iter(t)
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|n| !NOT_NAMES.iter().any(|x| n.eq_ignore_ascii_case(x)))
                    .last()
            })
    };
    pick(&EXPLICIT_NAME_RE)
        .or_else(|| pick(&ZH_NAME_RE))
        .or_else(|| pick(&SELF_INTRO_RE))
}

fn extract_focus_id(texts: &[&str]) -> Option<String> {
    texts
        .iter()
        .rev()
        .find_map(|t| FOCUS_ID_RE.captures_iter(t).last())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn updater() -> StateUpdater {
        StateUpdater::new(&StateConfig::default(), 900)
    }

    fn run(turns: &[ChatTurn]) -> ConversationState {
        updater().apply(ConversationState::new("c1", "en"), turns)
    }

    #[test]
    fn yes_alone_does_not_confirm() {
        let u = updater();
        assert!(!u.is_confirmation("yes"));
        assert!(u.is_confirmation("yes, send it"));
        assert!(u.is_confirmation("OK send"));
        assert!(u.is_confirmation("Please send the inquiry"));
        assert!(u.is_confirmation("确认发送"));
        assert!(u.is_confirmation("好的，发吧"));
        assert!(!u.is_confirmation("好的"));
    }

    #[test]
    fn closure_forces_false() {
        let u = updater();
        assert!(!u.is_confirmation("thanks, send it"));
        assert!(!u.is_confirmation("ok bye"));
    }

    #[test]
    fn weak_keywords_respect_word_boundaries() {
        let u = updater();
        assert!(!u.is_confirmation("look, I want the book sent"));
        assert!(!u.is_confirmation("can you resend the catalog"));
    }

    #[test]
    fn configured_lists_replace_builtins() {
        let config = StateConfig {
            confirm_keywords_strong: Some(BTreeMap::from([(
                "en".to_string(),
                vec!["ship it".to_string()],
            )])),
            ..StateConfig::default()
        };
        let u = StateUpdater::new(&config, 900);
        assert!(u.is_confirmation("ship it"));
        assert!(!u.is_confirmation("confirm"));
        assert!(u.is_confirmation("yes send"));
    }

    #[test]
    fn explicit_email_preferred_over_bare() {
        let s = run(&[ChatTurn::user(
            "my email is ana@shop.test, cc bob@shop.test please",
        )]);
        assert_eq!(s.slots.get_str("email"), Some("ana@shop.test"));
    }

    #[test]
    fn latest_bare_email_wins() {
        let s = run(&[
            ChatTurn::user("reach me at old@shop.test"),
            ChatTurn::assistant("noted"),
            ChatTurn::user("actually use new@shop.test or other@shop.test"),
        ]);
        assert_eq!(s.slots.get_str("email"), Some("other@shop.test"));
    }

    #[test]
    fn name_extraction_forms() {
        assert_eq!(
            run(&[ChatTurn::user("Hi, my name is Ana Lopez")]).slots.get_str("name"),
            Some("Ana Lopez")
        );
        assert_eq!(
            run(&[ChatTurn::user("I am Marco, from Milan")]).slots.get_str("name"),
            Some("Marco")
        );
        assert_eq!(
            run(&[ChatTurn::user("我叫李雷")]).slots.get_str("name"),
            Some("李雷")
        );
        assert_eq!(
            run(&[ChatTurn::user("I am looking for a backpack")]).slots.get_str("name"),
            None
        );
        assert_eq!(
            run(&[ChatTurn::user("I am Interested in totes")]).slots.get_str("name"),
            None
        );
    }

    #[test]
    fn explicit_name_beats_self_intro() {
        let s = run(&[ChatTurn::user("I am Bob. Actually, name: Robert")]);
        assert_eq!(s.slots.get_str("name"), Some("Robert"));
    }

    #[test]
    fn id_mention_pins_product() {
        let s = run(&[ChatTurn::user("Tell me about ID: jwl-outdoor-018 please")]);
        let pinned = s.active_product.unwrap();
        assert_eq!(pinned.id, "jwl-outdoor-018");
        assert_eq!(pinned.slug, "");
        assert_eq!(s.slots.get_str("product_id"), Some("jwl-outdoor-018"));
    }

    #[test]
    fn existing_slots_survive_turns_without_matches() {
        let u = updater();
        let s = u.apply(
            ConversationState::new("c1", "en"),
            &[ChatTurn::user("my email is a@b.test")],
        );
        let s = u.apply(s, &[ChatTurn::user("what colors are there?")]);
        assert_eq!(s.slots.get_str("email"), Some("a@b.test"));
        assert!(!s.slots.flag("confirm_send"));
    }

    #[test]
    fn confirmation_resets_on_topic_change() {
        let u = updater();
        let s = u.apply(ConversationState::new("c1", "en"), &[ChatTurn::user("yes send it")]);
        assert!(s.slots.flag("confirm_send"));
        let s = u.apply(s, &[ChatTurn::user("what else do you make?")]);
        assert!(!s.slots.flag("confirm_send"));
    }

    #[test]
    fn full_history_resend_is_not_duplicated() {
        let u = updater();
        let first = vec![ChatTurn::user("hello"), ChatTurn::assistant("hi!")];
        let s = u.apply(ConversationState::new("c1", "en"), &first);
        let mut second = first.clone();
        second.push(ChatTurn::user("do you sell totes"));
        let s = u.apply(s, &second);
        assert_eq!(s.recent_turns.len(), 3);
    }

    #[test]
    fn overflow_turns_fold_into_summary() {
        let config = StateConfig {
            recent_turns: 2,
            ..StateConfig::default()
        };
        let u = StateUpdater::new(&config, 900);
        let s = u.apply(
            ConversationState::new("c1", "en"),
            &[
                ChatTurn::user("first question"),
                ChatTurn::assistant("first answer"),
                ChatTurn::user("second question"),
            ],
        );
        assert_eq!(s.recent_turns.len(), 2);
        assert_eq!(s.summary, "user: first question");
    }

    #[test]
    fn unechoed_feedback_turns_do_not_break_alignment() {
        let u = updater();
        let first = [ChatTurn::user("ID: jwl-lunch-001 do you have this in blue?")];
        let mut s = u.apply(ConversationState::new("c1", "en"), &first);
        u.record(
            &mut s,
            &[
                ChatTurn {
                    role: "system".into(),
                    text: "System Notification: Tool 'product_search' returned 3 results".into(),
                },
                ChatTurn::assistant("Try the lunch bag."),
            ],
        );
        s.unpin();

        let history = [
            first[0].clone(),
            ChatTurn::assistant("Try the lunch bag."),
            ChatTurn::user("ok thanks"),
        ];
        let s = u.apply(s, &history);
        let roles: Vec<&str> = s.recent_turns.iter().map(|t| t.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "system", "assistant", "user"]);
        assert_eq!(
            s.recent_turns.iter().filter(|t| t.text == first[0].text).count(),
            1
        );
        assert!(s.active_product.is_none(), "stale ID mention re-pinned");
    }

    #[test]
    fn repeated_user_text_is_still_new() {
        let u = updater();
        let s = u.apply(ConversationState::new("c1", "en"), &[ChatTurn::user("yes")]);
        let s = u.apply(
            s,
            &[
                ChatTurn::user("yes"),
                ChatTurn::assistant("Shall I send it?"),
                ChatTurn::user("yes"),
            ],
        );
        let texts: Vec<&str> = s.recent_turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["yes", "yes"]);
    }

    #[test]
    fn recorded_overflow_folds_into_summary() {
        let config = StateConfig {
            recent_turns: 2,
            ..StateConfig::default()
        };
        let u = StateUpdater::new(&config, 900);
        let mut s = u.apply(ConversationState::new("c1", "en"), &[ChatTurn::user("hi there")]);
        u.record(
            &mut s,
            &[
                ChatTurn {
                    role: "system".into(),
                    text: "tool feedback".into(),
                },
                ChatTurn::assistant("hello!"),
            ],
        );
        assert_eq!(s.recent_turns.len(), 2);
        assert_eq!(s.summary, "user: hi there");
    }

    #[test]
    fn new_turns_overlap_detection() {
        let a = ChatTurn::user("a");
        let b = ChatTurn::assistant("b");
        let c = ChatTurn::user("c");
        assert_eq!(new_turns(&[a.clone(), b.clone()], &[a.clone(), b.clone(), c.clone()]), &[c.clone()]);
        assert_eq!(new_turns(&[a.clone(), b.clone()], &[c.clone()]), &[c.clone()]);
        assert_eq!(new_turns(&[a.clone(), b.clone()], &[b.clone(), c.clone()]), &[c.clone()]);
        assert_eq!(new_turns(&[], &[a.clone()]), &[a]);
    }

    #[test]
    fn long_history_resend_applies_only_the_tail() {
        let config = StateConfig {
            recent_turns: 4,
            ..StateConfig::default()
        };
        let u = StateUpdater::new(&config, 900);
        let mut history: Vec<ChatTurn> = (0..6)
            .map(|i| {
                if i % 2 == 0 {
                    ChatTurn::user(format!("q{i}"))
                } else {
                    ChatTurn::assistant(format!("a{i}"))
                }
            })
            .collect();
        let s = u.apply(ConversationState::new("c1", "en"), &history);
        assert_eq!(s.recent_turns.len(), 4);

        history.push(ChatTurn::user("q6"));
        let s = u.apply(s, &history);
        let texts: Vec<&str> = s.recent_turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a3", "q4", "a5", "q6"]);
        assert_eq!(s.summary, "user: q0\nassistant: a1\nuser: q2");
    }

    fn arb_turn() -> impl Strategy<Value = ChatTurn> {
        let texts = prop::sample::select(vec![
            "yes send it",
            "confirm",
            "yes",
            "ok",
            "thanks",
            "what is the moq",
            "my email is x@y.test",
            "好的，发送吧",
            "tell me more",
        ]);
        (any::<bool>(), texts).prop_map(|(user, text)| {
            if user {
                ChatTurn::user(text)
            } else {
                ChatTurn::assistant(text)
            }
        })
    }

    proptest! {
        #[test]
        fn confirmation_ignores_history(
            history in prop::collection::vec(arb_turn(), 0..12),
            latest in "[a-z ,]{0,24}|yes send it|ok|confirm|thanks|发送",
        ) {
            let u = updater();
            let alone = u.apply(ConversationState::new("c1", "en"), &[ChatTurn::user(latest.clone())]);
            let mut turns = history.clone();
            turns.push(ChatTurn::user(latest.clone()));
            let with_history = u.apply(ConversationState::new("c2", "en"), &turns);
            prop_assert_eq!(
                alone.slots.flag("confirm_send"),
                with_history.slots.flag("confirm_send")
            );
        }
    }
}
