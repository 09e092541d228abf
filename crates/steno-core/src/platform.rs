// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Meeting platform resolution.
//!
//! Classifies a meeting URL into one of the supported platforms by URL
//! shape. Unsupported URLs must reject bot creation outright: the fleet
//! never launches a task for an unresolved platform.

use std::sync::OnceLock;

use regex::Regex;

/// A supported meeting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeetingPlatform {
    /// Google Meet.
    GoogleMeet,
    /// Zoom.
    Zoom,
    /// Microsoft Teams.
    Teams,
}

impl MeetingPlatform {
    /// The database representation of this platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleMeet => "GOOGLE_MEET",
            Self::Zoom => "ZOOM",
            Self::Teams => "TEAMS",
        }
    }

    /// Parse a database platform string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GOOGLE_MEET" => Some(Self::GoogleMeet),
            "ZOOM" => Some(Self::Zoom),
            "TEAMS" => Some(Self::Teams),
            _ => None,
        }
    }

    /// All supported platforms.
    pub const ALL: [MeetingPlatform; 3] = [Self::GoogleMeet, Self::Zoom, Self::Teams];
}

impl std::fmt::Display for MeetingPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn zoom_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://(.*?\.)?zoom\.us/j/\d+").unwrap())
}

fn teams_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://teams\.microsoft\.com/l/meetup-join/\S+").unwrap())
}

/// Resolve a meeting URL to its platform, or `None` if unsupported.
pub fn resolve_platform(meeting_url: &str) -> Option<MeetingPlatform> {
    if meeting_url.starts_with("https://meet.google.com/") {
        Some(MeetingPlatform::GoogleMeet)
    } else if zoom_pattern().is_match(meeting_url) {
        Some(MeetingPlatform::Zoom)
    } else if teams_pattern().is_match(meeting_url) {
        Some(MeetingPlatform::Teams)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_google_meet() {
        assert_eq!(
            resolve_platform("https://meet.google.com/abc-defg-hij"),
            Some(MeetingPlatform::GoogleMeet)
        );
        // Google Meet links must be https.
        assert_eq!(resolve_platform("http://meet.google.com/abc-defg-hij"), None);
    }

    #[test]
    fn test_resolves_zoom() {
        assert_eq!(
            resolve_platform("https://zoom.us/j/123456789"),
            Some(MeetingPlatform::Zoom)
        );
        assert_eq!(
            resolve_platform("https://us02web.zoom.us/j/987654321?pwd=abc"),
            Some(MeetingPlatform::Zoom)
        );
        assert_eq!(resolve_platform("https://zoom.us/about"), None);
        assert_eq!(resolve_platform("https://zoom.us/j/"), None);
    }

    #[test]
    fn test_resolves_teams() {
        assert_eq!(
            resolve_platform("https://teams.microsoft.com/l/meetup-join/19%3ameeting_x@thread.v2/0"),
            Some(MeetingPlatform::Teams)
        );
        assert_eq!(resolve_platform("https://teams.microsoft.com/l/chat/0/0"), None);
    }

    #[test]
    fn test_rejects_unsupported() {
        assert_eq!(resolve_platform("https://example.com/meeting/123"), None);
        assert_eq!(resolve_platform("not a url"), None);
        assert_eq!(resolve_platform(""), None);
    }

    #[test]
    fn test_platform_roundtrip() {
        for platform in MeetingPlatform::ALL {
            assert_eq!(MeetingPlatform::parse(platform.as_str()), Some(platform));
        }
        assert_eq!(MeetingPlatform::parse("WEBEX"), None);
    }
}
