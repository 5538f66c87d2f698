//! Zombie alert catalogue.

use std::time::Duration;

use hisho_speech::Animation;
use rand::seq::SliceRandom;

/// How long alert notifications stay on screen.
pub const ALERT_DISPLAY_TIME: Duration = Duration::from_millis(5000);

const OVERLOAD_LINES: &[&str] = &[
    "危険よ！ゾンビが大量に接近中！",
    "ゾンビの大群よ！早く安全な場所へ！",
    "大変！ゾンビがたくさんいるわ！急いで！",
    "周りがゾンビだらけよ！気をつけて！",
    "ゾンビの群れが迫ってきてる！",
];

const FEW_LINES: &[&str] = &[
    "ゾンビを見つけたわ。注意して！",
    "ゾンビがいるわ！気をつけて！",
    "ちょっと、ゾンビが近くにいるわよ！",
    "あっ、ゾンビよ！気をつけて！",
];

const WARNING_LINES: &[&str] = &[
    "周辺にゾンビがいるみたい。気をつけて行動してね。",
    "ゾンビの気配を感じるわ。警戒したほうがいいかも？",
    "ゾンビが近くにいるかも。用心して行動してね。",
    "何か動くものを感知したわ。もしかしたらゾンビかも。",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Large group detected.
    Overload,
    /// One or two detected.
    Few,
    /// Three or four detected.
    Warning,
}

impl AlertKind {
    pub fn event_type(self) -> &'static str {
        match self {
            Self::Overload => "zombie_overload",
            Self::Few => "zombie_few",
            Self::Warning => "zombie_warning",
        }
    }

    pub fn emotion(self) -> &'static str {
        match self {
            Self::Overload => "surprised",
            Self::Few => "normal",
            Self::Warning => "serious",
        }
    }

    pub fn animation(self) -> Animation {
        match self {
            Self::Overload | Self::Warning => Animation::Trembling,
            Self::Few => Animation::BounceLight,
        }
    }

    /// Count assumed when the payload has none. `None` means "many".
    pub fn default_count(self) -> Option<u64> {
        match self {
            Self::Overload => None,
            Self::Few => Some(1),
            Self::Warning => Some(3),
        }
    }

    pub fn lines(self) -> &'static [&'static str] {
        match self {
            Self::Overload => OVERLOAD_LINES,
            Self::Few => FEW_LINES,
            Self::Warning => WARNING_LINES,
        }
    }

    /// Picks one spoken line at random.
    pub fn pick_line(self) -> &'static str {
        self.lines()
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn picked_line_belongs_to_kind() {
        for kind in [AlertKind::Overload, AlertKind::Few, AlertKind::Warning] {
            assert!(kind.lines().contains(&kind.pick_line()));
        }
    }

    #[test]
    fn every_line_gets_picked() {
        for kind in [AlertKind::Overload, AlertKind::Few, AlertKind::Warning] {
            let seen: HashSet<&str> = (0..500).map(|_| kind.pick_line()).collect();
            assert_eq!(seen.len(), kind.lines().len(), "{kind:?}");
        }
    }

    #[test]
    fn defaults_per_kind() {
        assert_eq!(AlertKind::Overload.default_count(), None);
        assert_eq!(AlertKind::Few.default_count(), Some(1));
        assert_eq!(AlertKind::Warning.default_count(), Some(3));
        assert_eq!(AlertKind::Few.animation(), Animation::BounceLight);
    }
}
