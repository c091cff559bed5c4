//! YouTube URL utilities and the (deliberately stubbed) audio proxy.
//! Real audio extraction never worked in the original pipeline and is an
//! explicit non-goal; the proxy resolves to a bundled demo track so the
//! rest of the game has a concrete audio source to point at.

/// Path of the bundled placeholder track the audio proxy resolves to.
pub const DEMO_AUDIO_PATH: &str = "/demo-audio.mp3";

/// Extract the video id from the common YouTube URL shapes:
/// `youtube.com/watch?v=ID`, `youtu.be/ID` and `youtube.com/embed/ID`.
/// The id runs until `&`, `?`, `#` or end of string. Returns `None` for
/// anything else, which callers treat as "fall back to demo mode".
pub fn extract_video_id(url: &str) -> Option<String> {
    let rest = ["youtube.com/watch?v=", "youtu.be/", "youtube.com/embed/"]
        .iter()
        .find_map(|marker| url.split_once(marker).map(|(_, rest)| rest))?;
    let id: String = rest
        .chars()
        .take_while(|c| !matches!(c, '&' | '?' | '#' | '\n'))
        .collect();
    if id.is_empty() { None } else { Some(id) }
}

/// Embed URL with chrome and keyboard controls disabled, matching the
/// player the hosting page shows alongside the game.
pub fn embed_url(video_id: &str) -> String {
    format!(
        "https://www.youtube.com/embed/{video_id}?autoplay=1&controls=0&disablekb=1&fs=0&modestbranding=1&rel=0"
    )
}

/// Stub audio proxy: browsers cannot pull YouTube audio directly, and the
/// backend service that would do it does not exist. The id is accepted so
/// the interface is ready for one, but the result is always the demo track.
pub fn resolve_audio_proxy(_video_id: &str) -> String {
    DEMO_AUDIO_PATH.to_string()
}
