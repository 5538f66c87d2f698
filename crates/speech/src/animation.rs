/// Short visual accents played alongside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Animation {
    BounceLight,
    Trembling,
    NervousShake,
}

impl Animation {
    /// Parses a wire animation name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bounce_light" => Some(Self::BounceLight),
            "trembling" => Some(Self::Trembling),
            "nervous_shake" | "nervous-shake" => Some(Self::NervousShake),
            _ => None,
        }
    }

    /// Animation implied by an emotion in preset-backed notifications.
    pub fn for_emotion(emotion: &str) -> Option<Self> {
        match emotion {
            "surprised" | "startled" | "fearful" => Some(Self::NervousShake),
            "serious" => Some(Self::Trembling),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BounceLight => "bounce_light",
            Self::Trembling => "trembling",
            Self::NervousShake => "nervous_shake",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_both_shake_spellings() {
        assert_eq!(Animation::parse("nervous-shake"), Some(Animation::NervousShake));
        assert_eq!(Animation::parse("nervous_shake"), Some(Animation::NervousShake));
        assert_eq!(Animation::parse("spin"), None);
    }

    #[test]
    fn emotion_mapping() {
        assert_eq!(Animation::for_emotion("startled"), Some(Animation::NervousShake));
        assert_eq!(Animation::for_emotion("serious"), Some(Animation::Trembling));
        assert_eq!(Animation::for_emotion("happy"), None);
    }
}
