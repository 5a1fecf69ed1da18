//! Page editing example
//!
//! Loads a page tree, edits it, and dumps it back.

use pageview_core::{BufferEvent, Element, TextBuffer};
use std::sync::{Arc, Mutex};

fn main() {
    println!("=== Page editing ===\n");

    let tree = Element::from_xml(
        "<zim-tree><h level=\"1\">Shopping\n</h>\
         <p><ul><li bullet=\"unchecked-box\">Bread\n</li><li bullet=\"unchecked-box\">Milk\n</li></ul></p></zim-tree>",
    )
    .unwrap();
    let mut buffer = TextBuffer::from_tree(&tree).unwrap();

    let events = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&events);
    buffer.subscribe(move |event: &BufferEvent| {
        if event.is_text_change() {
            *counter.lock().unwrap() += 1;
        }
    });

    println!("1. Loaded text:");
    for line in 0..buffer.line_count() {
        println!("  {:>2}: {:?}", line, buffer.get_line_text(line));
    }

    println!("\n2. Make a word bold and add a line:");
    buffer.select_range(buffer.line_start(1) + 2, buffer.line_end(1));
    buffer.toggle_format("strong", None).unwrap();
    let end = buffer.line_end(2);
    buffer.place_cursor(end);
    buffer.insert_at_cursor("\nEggs").unwrap();
    println!("  {}", buffer.dump(None).unwrap().to_xml());

    println!("\n3. Tick a checkbox:");
    buffer.toggle_checkbox(1, pageview_core::CheckState::Checked).unwrap();
    println!("  line 1: {:?}", buffer.get_checkbox_at_line(1));

    println!("\n4. Undo everything:");
    let mut steps = 0;
    while buffer.undo() {
        steps += 1;
    }
    println!("  {} undo steps, back to original: {}", steps, buffer.dump(None).unwrap() == tree);
    println!("  text change events seen: {}", events.lock().unwrap());
}
