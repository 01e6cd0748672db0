//! Message translation between the two chat systems

/// Fragment of the anchor every Discord-originated Teams message carries.
/// A fetched Teams body containing it was posted by this bridge and must
/// not be relayed back, or every message would echo forever.
pub const DISCORD_ORIGIN_MARKER: &str = "<i>from Discord</i></a>";

const SENT_BY_COMMENT: &str = "<!-- SENT FROM DISCORD BY QUILL -->";

pub fn is_discord_origin(html: &str) -> bool {
    html.contains(DISCORD_ORIGIN_MARKER)
}

/// Wrap a Discord message as the HTML body posted into a Teams chat,
/// including the origin marker.
pub fn compose_teams_html(author: &str, jump_url: &str, html_body: &str) -> String {
    format!(
        "<div><p><b>{author}</b> <a href=\"{jump_url}\"><i>from Discord</i></a></p>\
         <div>{html_body}</div></div>{SENT_BY_COMMENT}"
    )
}

/// The text posted into Discord for a relayed Teams message.
pub fn render_teams_message(display_name: &str, content: &str) -> String {
    format!("**{display_name}** _from Teams_\n{content}")
}

/// Reduce a Teams HTML body to plain text: drop tags, decode the entities
/// Graph emits.
pub fn strip_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    decode_entities(&result)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
