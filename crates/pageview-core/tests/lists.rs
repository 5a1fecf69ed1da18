use pageview_core::{Bullet, CheckState, Element, Numeral, TextBuffer, TextBufferList};
use pretty_assertions::assert_eq;

fn buffer_from(body: &str) -> TextBuffer {
    TextBuffer::from_tree(&Element::from_xml(&format!("<zim-tree>{}</zim-tree>", body)).unwrap())
        .unwrap()
}

fn body(buffer: &TextBuffer) -> String {
    let xml = buffer.dump(None).unwrap().to_xml();
    let start = xml.find("<zim-tree>").unwrap() + "<zim-tree>".len();
    let end = xml.rfind("</zim-tree>").unwrap();
    xml[start..end].to_string()
}

#[test]
fn test_list_rows() {
    let buffer = buffer_from(
        "<p>intro\n<ol><li>one\n</li><ol><li>sub\n</li></ol><li>two\n</li></ol>outro\n</p>",
    );
    assert!(TextBufferList::new_from_line(&buffer, 0).is_none());
    let (row, list) = TextBufferList::new_from_line(&buffer, 2).unwrap();
    assert_eq!(row, 1);
    assert_eq!((list.firstline, list.lastline), (1, 3));
    let indents: Vec<u32> = list.rows().iter().map(|r| r.indent).collect();
    assert_eq!(indents, vec![0, 1, 0]);
    assert!(list.rows()[1].bullet.is_numbered());
    assert_eq!(list.parent(1), Some(0));
    assert_eq!(list.children(0), vec![1]);
    assert_eq!(list.get_row_at_line(3), Some(2));
    assert!(list.can_indent(2));
    assert!(!list.can_indent(1));
    assert!(list.can_unindent(1));
    assert!(!list.can_unindent(2));
}

#[test]
fn test_indent_renumbers_both_levels() {
    let mut buffer = buffer_from("<p><ol><li>one\n</li><li>two\n</li><li>three\n</li></ol></p>");
    let (row, mut list) = TextBufferList::new_from_line(&buffer, 1).unwrap();
    assert!(list.indent(&mut buffer, row).is_some());
    assert_eq!(
        body(&buffer),
        "<p><ol><li>one\n</li><ol start=\"a\"><li>two\n</li></ol><li>three\n</li></ol></p>"
    );
    assert_eq!(buffer.get_bullet_at_line(2), Some(Bullet::Numbered(Numeral::Number(2))));

    assert!(buffer.undo());
    assert_eq!(
        body(&buffer),
        "<p><ol><li>one\n</li><li>two\n</li><li>three\n</li></ol></p>"
    );
}

#[test]
fn test_renumber_list_keeps_first_value() {
    let mut buffer = buffer_from("<p><ol start=\"5\"><li>a\n</li><li>b\n</li></ol></p>");
    buffer.renumber_list(1);
    assert_eq!(buffer.get_bullet_at_line(0), Some(Bullet::Numbered(Numeral::Number(5))));
    assert_eq!(buffer.get_bullet_at_line(1), Some(Bullet::Numbered(Numeral::Number(6))));
}

#[test]
fn test_checking_all_children_checks_parent() {
    let mut buffer = buffer_from(
        "<p><ul><li bullet=\"unchecked-box\">parent\n</li>\
         <ul><li bullet=\"unchecked-box\">a\n</li><li bullet=\"unchecked-box\">b\n</li></ul></ul></p>",
    );
    assert!(buffer.toggle_checkbox(1, CheckState::Checked).unwrap());
    assert_eq!(buffer.get_checkbox_at_line(0), Some(CheckState::Unchecked));
    assert!(buffer.toggle_checkbox(2, CheckState::Checked).unwrap());
    assert_eq!(buffer.get_checkbox_at_line(0), Some(CheckState::Checked));

    assert!(buffer.toggle_checkbox(2, CheckState::Checked).unwrap());
    assert_eq!(buffer.get_checkbox_at_line(2), Some(CheckState::Unchecked));
    assert_eq!(buffer.get_checkbox_at_line(0), Some(CheckState::Unchecked));
}
