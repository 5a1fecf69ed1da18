//! List renumbering example
//!
//! Indents and unindents items of a numbered list.

use pageview_core::{Element, TextBuffer, TextBufferList};

fn print_lines(buffer: &TextBuffer) {
    for line in 0..buffer.line_count() {
        let text = buffer.get_line_text(line);
        if !text.is_empty() {
            println!("  {}{}", "    ".repeat(buffer.get_indent_at_line(line) as usize), text);
        }
    }
}

fn main() {
    println!("=== List renumbering ===\n");

    let tree = Element::from_xml(
        "<zim-tree><p><ol><li>Prepare\n</li><li>Cook\n</li><li>Serve\n</li><li>Clean up\n</li></ol></p></zim-tree>",
    )
    .unwrap();
    let mut buffer = TextBuffer::from_tree(&tree).unwrap();
    println!("1. Initial list:");
    print_lines(&buffer);

    println!("\n2. Indent 'Cook' and 'Serve':");
    for line in [1, 2] {
        if let Some((row, mut list)) = TextBufferList::new_from_line(&buffer, line) {
            list.indent(&mut buffer, row);
        }
    }
    print_lines(&buffer);

    println!("\n3. Unindent 'Cook':");
    if let Some((row, mut list)) = TextBufferList::new_from_line(&buffer, 1) {
        list.unindent(&mut buffer, row);
    }
    print_lines(&buffer);
}
