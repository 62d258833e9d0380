//! HTML rendering for the ranked topic page.

use storage::Topic;

/// Escape text for embedding in HTML element or attribute context.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Render the ranked page: one row per topic with its vote forms, then
/// the create form.
pub fn render_page(topics: &[Topic]) -> String {
    let mut body = String::from(
        r#"<!DOCTYPE html>
<html>
<head>
<title>Tally</title>
<style>
body { font-family: sans-serif; max-width: 40em; margin: 2em auto; }
li { margin: 0.5em 0; }
form { display: inline; }
.votes { display: inline-block; min-width: 2.5em; font-weight: bold; }
</style>
</head>
<body>
<h1>Tally</h1>
"#,
    );

    if topics.is_empty() {
        body.push_str("<p>No topics yet.</p>\n");
    } else {
        body.push_str("<ol>\n");
        for topic in topics {
            body.push_str(&format!(
                concat!(
                    "<li><span class=\"votes\">{votes}</span> {content}\n",
                    "<form method=\"post\" action=\"/upvote\">",
                    "<input type=\"hidden\" name=\"id\" value=\"{id}\">",
                    "<button>&#9650;</button></form>\n",
                    "<form method=\"post\" action=\"/downvote\">",
                    "<input type=\"hidden\" name=\"id\" value=\"{id}\">",
                    "<button>&#9660;</button></form></li>\n",
                ),
                votes = topic.votes(),
                content = escape_html(&topic.content),
                id = escape_html(&topic.id),
            ));
        }
        body.push_str("</ol>\n");
    }

    body.push_str(
        r#"<form method="post" action="/create">
<input type="text" name="content" placeholder="Start a new topic" maxlength="400">
<button>Create</button>
</form>
</body>
</html>
"#,
    );

    body
}
