//! User-facing strings emitted by the page agent and control surface.

use vidpace_model::ResolvedLanguage;

/// Everything the components can show to a user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    /// On-page overlay after a speed change.
    SpeedFeedback { speed: f64, count: usize },
    /// On-page overlay when the page has no media.
    NoMediaFeedback,
    /// On-page overlay when no media element has metadata yet.
    NotReadyFeedback,
    /// Surface notification after a successful speed preset.
    SpeedApplied { speed: f64, count: usize },
    NoMediaFound,
    MediaNotReady,
    /// The focused page has no agent to talk to.
    ControllerMissing,
    SettingsSaved,
    SaveFailed,
    LoadFailed,
    RewindSeconds(u16),
    ForwardSeconds(u16),
}

impl Message {
    pub fn render(&self, language: ResolvedLanguage) -> String {
        match language {
            ResolvedLanguage::En => self.english(),
            ResolvedLanguage::Zh => self.chinese(),
        }
    }

    fn english(&self) -> String {
        match *self {
            Self::SpeedFeedback { speed, count } => {
                let noun = if count == 1 { "video" } else { "videos" };
                format!("{}x ({count} {noun})", rate(speed))
            }
            Self::NoMediaFeedback => "No video elements found".into(),
            Self::NotReadyFeedback => "Cannot set speed - check video state".into(),
            Self::SpeedApplied { speed, count } => {
                format!("Speed set to {}x ({count} found)", rate(speed))
            }
            Self::NoMediaFound => {
                "No video elements found. Make sure the page has a loaded video".into()
            }
            Self::MediaNotReady => "Videos are still loading, try again shortly".into(),
            Self::ControllerMissing => {
                "Cannot reach this page. Reload it and try again".into()
            }
            Self::SettingsSaved => "Settings saved!".into(),
            Self::SaveFailed => "Failed to save settings".into(),
            Self::LoadFailed => "Failed to load settings, showing defaults".into(),
            Self::RewindSeconds(n) => format!("Rewind {n} seconds"),
            Self::ForwardSeconds(n) => format!("Forward {n} seconds"),
        }
    }

    fn chinese(&self) -> String {
        match *self {
            Self::SpeedFeedback { speed, count } => {
                format!("{}x ({count}个视频)", rate(speed))
            }
            Self::NoMediaFeedback => "没有找到视频元素".into(),
            Self::NotReadyFeedback => "无法设置速度 - 检查视频状态".into(),
            Self::SpeedApplied { speed, count } => {
                format!("速度设置为 {}x (找到{count}个视频)", rate(speed))
            }
            Self::NoMediaFound => "没有找到视频元素，请确保页面有视频并已加载".into(),
            Self::MediaNotReady => "视频尚未加载完成，请稍后重试".into(),
            Self::ControllerMissing => "无法连接到页面，请刷新页面后重试".into(),
            Self::SettingsSaved => "设置已保存".into(),
            Self::SaveFailed => "保存设置失败".into(),
            Self::LoadFailed => "加载设置失败，已使用默认值".into(),
            Self::RewindSeconds(n) => format!("后退 {n} 秒"),
            Self::ForwardSeconds(n) => format!("快进 {n} 秒"),
        }
    }
}

/// Formats a playback rate without a trailing `.0`.
fn rate(speed: f64) -> String {
    if speed.fract() == 0.0 && speed.is_finite() {
        format!("{speed:.0}")
    } else {
        speed.to_string()
    }
}

/// Overlay text for a seek: `-30s`, `+10s`.
pub fn seek_feedback(delta_seconds: f64) -> String {
    let sign = if delta_seconds < 0.0 { '-' } else { '+' };
    format!("{sign}{}s", rate(delta_seconds.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_feedback_is_signed_whole_seconds() {
        assert_eq!(seek_feedback(-30.0), "-30s");
        assert_eq!(seek_feedback(10.0), "+10s");
    }

    #[test]
    fn helper_lines_in_both_languages() {
        assert_eq!(
            Message::RewindSeconds(45).render(ResolvedLanguage::En),
            "Rewind 45 seconds"
        );
        assert_eq!(
            Message::ForwardSeconds(15).render(ResolvedLanguage::Zh),
            "快进 15 秒"
        );
    }

    #[test]
    fn speed_renders_without_trailing_zero() {
        let applied = Message::SpeedApplied { speed: 2.0, count: 3 };
        assert_eq!(applied.render(ResolvedLanguage::En), "Speed set to 2x (3 found)");
        let feedback = Message::SpeedFeedback { speed: 1.25, count: 1 };
        assert_eq!(feedback.render(ResolvedLanguage::En), "1.25x (1 video)");
        assert_eq!(feedback.render(ResolvedLanguage::Zh), "1.25x (1个视频)");
    }
}
