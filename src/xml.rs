//! Minimal event tokenizer for the restricted SVG grammar: start/end
//! tags with quoted attributes, text content, and comments. No entity
//! expansion, namespaces, or DTD handling. Malformed input degrades to
//! skipped tokens rather than errors.

use crate::scan::is_space;

/// Attribute pairs retained per element; extras are dropped.
pub(crate) const MAX_ATTRIBS: usize = 64;

pub(crate) trait XmlSink {
    fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]);
    fn end_element(&mut self, name: &str);
    fn content(&mut self, _text: &str) {}
}

fn emit_content(text: &str, sink: &mut impl XmlSink) {
    let trimmed = text.trim_start_matches(|c: char| c.is_ascii() && is_space(c as u8));
    if !trimmed.is_empty() {
        sink.content(trimmed);
    }
}

/// Parses the text between `<` and `>`: tag name, attributes,
/// self-closing and end-tag markers.
fn emit_element(tag: &str, sink: &mut impl XmlSink) {
    let b = tag.as_bytes();
    let mut i = 0usize;
    while i < b.len() && is_space(b[i]) {
        i += 1;
    }

    let mut end_tag = false;
    if i < b.len() && b[i] == b'/' {
        end_tag = true;
        i += 1;
    }

    // Processing instructions, doctype, and empty tags are skipped.
    if i >= b.len() || b[i] == b'?' || b[i] == b'!' {
        return;
    }

    let name_start = i;
    while i < b.len() && !is_space(b[i]) && b[i] != b'/' {
        i += 1;
    }
    let name = &tag[name_start..i];
    if name.is_empty() {
        return;
    }

    let mut attrs: Vec<(&str, &str)> = Vec::new();
    let mut self_closing = false;
    while !end_tag && i < b.len() && attrs.len() < MAX_ATTRIBS {
        while i < b.len() && is_space(b[i]) {
            i += 1;
        }
        if i >= b.len() {
            break;
        }
        if b[i] == b'/' {
            self_closing = true;
            break;
        }

        let attr_start = i;
        while i < b.len() && !is_space(b[i]) && b[i] != b'=' {
            i += 1;
        }
        let attr_name = &tag[attr_start..i];

        // Scan to the opening quote.
        let mut quote = 0u8;
        while i < b.len() && b[i] != b'"' && b[i] != b'\'' {
            i += 1;
        }
        if i < b.len() {
            quote = b[i];
            i += 1;
        }
        let value_start = i;
        while i < b.len() && b[i] != quote {
            i += 1;
        }
        let value = &tag[value_start..i];
        if i < b.len() {
            i += 1;
        }

        // Only well-formed attributes are kept.
        if !attr_name.is_empty() && quote != 0 {
            attrs.push((attr_name, value));
        }
    }

    if end_tag {
        sink.end_element(name);
    } else {
        sink.start_element(name, &attrs);
        if self_closing {
            sink.end_element(name);
        }
    }
}

pub(crate) fn parse_xml(input: &str, sink: &mut impl XmlSink) {
    let b = input.as_bytes();
    let mut i = 0usize;
    let mut mark = 0usize;

    #[derive(PartialEq)]
    enum State {
        Content,
        Tag,
        Comment,
    }
    let mut state = State::Content;

    while i < b.len() {
        match state {
            State::Content => {
                if b[i] == b'<' {
                    if input[i..].starts_with("<!--") {
                        emit_content(&input[mark..i], sink);
                        i += 4;
                        mark = i;
                        state = State::Comment;
                    } else {
                        emit_content(&input[mark..i], sink);
                        i += 1;
                        mark = i;
                        state = State::Tag;
                    }
                } else {
                    i += 1;
                }
            }
            State::Tag => {
                if b[i] == b'>' {
                    emit_element(&input[mark..i], sink);
                    i += 1;
                    mark = i;
                    state = State::Content;
                } else {
                    i += 1;
                }
            }
            State::Comment => {
                if input[i..].starts_with("-->") {
                    i += 3;
                    mark = i;
                    state = State::Content;
                } else {
                    i += 1;
                }
            }
        }
    }
    if state == State::Content {
        emit_content(&input[mark..], sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl XmlSink for Recorder {
        fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) {
            let mut line = format!("start {name}");
            for (k, v) in attrs {
                line.push_str(&format!(" {k}={v}"));
            }
            self.events.push(line);
        }
        fn end_element(&mut self, name: &str) {
            self.events.push(format!("end {name}"));
        }
        fn content(&mut self, text: &str) {
            self.events.push(format!("text {text}"));
        }
    }

    fn run(input: &str) -> Vec<String> {
        let mut rec = Recorder::default();
        parse_xml(input, &mut rec);
        rec.events
    }

    #[test]
    fn basic_nesting() {
        let events = run("<svg width=\"10\"><g></g></svg>");
        assert_eq!(events, ["start svg width=10", "start g", "end g", "end svg"]);
    }

    #[test]
    fn self_closing_emits_both_events() {
        let events = run("<svg><rect width=\"4\"/><circle/></svg>");
        assert_eq!(
            events,
            [
                "start svg",
                "start rect width=4",
                "end rect",
                "start circle",
                "end circle",
                "end svg"
            ]
        );
    }

    #[test]
    fn comments_and_prolog_are_skipped() {
        let events = run("<?xml version=\"1.0\"?><!-- a <g> inside --><svg></svg>");
        assert_eq!(events, ["start svg", "end svg"]);
    }

    #[test]
    fn single_quoted_and_unterminated_values() {
        // the `>` inside the unterminated value still closes the tag
        let events = run("<p a='1' b=\"2></p>");
        assert_eq!(events, ["start p a=1 b=2", "end p"]);
    }

    #[test]
    fn unquoted_value_scans_to_next_quote() {
        // `a=1` has no quotes, so the scanner runs ahead to b's quoted
        // value and pairs it with `a`
        let events = run("<p a=1 b=\"2\"></p>");
        assert_eq!(events, ["start p a=2", "end p"]);
    }

    #[test]
    fn content_is_trimmed_and_reported() {
        let events = run("<t>  hello </t>");
        assert_eq!(events, ["start t", "text hello ", "end t"]);
    }
}
