use std::fmt::Write;

use crate::app::Result;
use crate::domain::Post;
use crate::render::splice::splice;

const BLOCK_SEPARATOR: &str = "\n\n";

/// Posts in presentation order: oldest first, ties broken by id.
pub fn chronological(posts: &[Post]) -> Vec<&Post> {
    let mut ordered: Vec<&Post> = posts.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    ordered
}

/// Render the HTML digest. An empty slice renders as an empty string.
pub fn format(posts: &[Post]) -> Result<String> {
    let blocks = chronological(posts)
        .into_iter()
        .map(render_html_block)
        .collect::<Result<Vec<_>>>()?;
    Ok(blocks.join(BLOCK_SEPARATOR))
}

fn render_html_block(post: &Post) -> Result<String> {
    let body = splice(&post.text, &post.links)?;
    Ok(format!(
        "<p><b><a href=\"{profile}\">{author}:</a> </b>{body}<br/>\
         <small><a href=\"{permalink}\">{time}</a></small></p>",
        profile = post.profile_url(),
        author = post.author,
        body = body,
        permalink = post.permalink(),
        time = post.display_time(),
    ))
}

/// Render the plaintext alternative part.
pub fn format_plain(posts: &[Post]) -> String {
    chronological(posts)
        .into_iter()
        .map(|post| {
            format!(
                "{}: {}\n{} {}",
                post.author,
                post.text,
                post.display_time(),
                post.permalink()
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Replace every non-ASCII character with a decimal character reference.
pub fn ascii_safe(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let _ = write!(out, "&#{};", c as u32);
        }
    }
    out
}
