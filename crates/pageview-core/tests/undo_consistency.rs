//! Random edits checked against a rope, then fully undone and redone.

use pageview_core::TextBuffer;
use rand::Rng;
use ropey::Rope;

fn sample_text(lines: usize) -> String {
    let mut text = String::new();
    for i in 0..lines {
        text.push_str(&format!("Line {} with some words, 你好 and more text\n", i));
    }
    text
}

#[test]
fn test_random_edits_undo_to_original() {
    let original = sample_text(200);
    let mut buffer = TextBuffer::new();
    buffer.insert_text(0, &original, false).unwrap();
    buffer.clear_undo_stack();
    let mut reference = Rope::from_str(&original);

    let mut rng = rand::thread_rng();
    for _ in 0..300 {
        let len = buffer.char_count();
        if rng.gen_bool(0.5) || len == 0 {
            let text = match rng.gen_range(0..4) {
                0 => "X",
                1 => "你好",
                2 => "👋",
                _ => "test\n",
            };
            let offset = rng.gen_range(0..=len);
            buffer.insert_text(offset, text, false).unwrap();
            reference.insert(offset, text);
        } else {
            let start = rng.gen_range(0..len);
            let end = (start + rng.gen_range(1..10)).min(len);
            buffer.delete_range(start, end).unwrap();
            reference.remove(start..end);
        }
        assert_eq!(buffer.char_count(), reference.len_chars());
    }
    let edited = reference.to_string();
    assert_eq!(buffer.get_text(), edited);

    while buffer.undo() {}
    assert_eq!(buffer.get_text(), original);
    while buffer.redo() {}
    assert_eq!(buffer.get_text(), edited);
}
