//! Find and replace example
//!
//! Demonstrates queries with flags, highlighting and regex replacement.

use pageview_core::{
    Element, FIND_REGEX, FIND_WHOLE_WORD, FindInterface, FindMatch, FindQuery, TextBuffer,
};

fn main() {
    println!("=== Find and replace ===\n");

    let tree = Element::from_xml(
        "<zim-tree><p>Meeting on 2024-03-01 about the text buffer.\n\
         Follow up on 2024-03-15, bring the <strong>text</strong> notes.\n</p></zim-tree>",
    )
    .unwrap();
    let mut buffer = TextBuffer::from_tree(&tree).unwrap();

    let query = FindQuery::new("text", FIND_WHOLE_WORD).unwrap();
    buffer.find_highlight_all(&query);
    println!("1. Highlights for {:?}:", query.string());
    for m in buffer.find_highlights() {
        if let FindMatch::Text { start, end } = m {
            println!("  {}..{} {:?}", start, end, buffer.get_slice(start, end));
        }
    }

    println!("\n2. Step through matches:");
    for _ in 0..3 {
        if buffer.find_next(&query, true) {
            let pos = buffer.offset_to_position(buffer.cursor());
            println!("  match at line {} column {}", pos.line, pos.column);
        }
    }

    println!("\n3. Reformat dates:");
    let dates = FindQuery::new(r"(\d{4})-(\d\d)-(\d\d)", FIND_REGEX).unwrap();
    buffer.find_replace_all(&dates, "\\3.\\2.\\1");
    println!("  {}", buffer.get_text().replace('\n', "\n  "));

    println!("\n4. Undo the replacement:");
    buffer.undo();
    println!("  {}", buffer.get_text().replace('\n', "\n  "));
}
