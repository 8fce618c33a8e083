use anyhow::Result;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Cursor;

fn crunch_text_for_cdata(input: &str) -> String {
    // 1) Trim trailing whitespace on each line.
    // 2) Collapse repeated newlines (\n\n\n -> \n).

    let mut out = String::with_capacity(input.len());
    let mut prev_nl = false;
    for part in input.split_inclusive('\n') {
        let (line, nl) = match part.strip_suffix('\n') {
            Some(line) => (line, true),
            None => (part, false),
        };
        let line = line.trim_end_matches([' ', '\t', '\r']);
        if !line.is_empty() {
            out.push_str(line);
            prev_nl = false;
        }
        if nl && !prev_nl {
            out.push('\n');
            prev_nl = true;
        }
    }

    out.trim_end().to_string()
}

/// Render `(path, content)` pairs as the assistant context payload.
///
/// `<context files="N" tokens="T"><file path=".." tokens=".."><![CDATA[..]]></file>..</context>`
pub fn build_context_xml(files: &[(String, usize, String)]) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let total_tokens: usize = files.iter().map(|(_, t, _)| *t).sum();
    let mut root = BytesStart::new("context");
    root.push_attribute(("files", files.len().to_string().as_str()));
    root.push_attribute(("tokens", total_tokens.to_string().as_str()));
    writer.write_event(Event::Start(root))?;

    for (path, tokens, content) in files {
        let mut file_el = BytesStart::new("file");
        file_el.push_attribute(("path", path.as_str()));
        file_el.push_attribute(("tokens", tokens.to_string().as_str()));
        writer.write_event(Event::Start(file_el))?;

        let content = crunch_text_for_cdata(content);
        // CDATA cannot contain its own terminator; split it across sections.
        let mut rest = content.as_str();
        while let Some(pos) = rest.find("]]>") {
            writer.write_event(Event::CData(BytesCData::new(&rest[..pos + 2])))?;
            rest = &rest[pos + 2..];
        }
        writer.write_event(Event::CData(BytesCData::new(rest)))?;
        writer.write_event(Event::End(BytesEnd::new("file")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("context")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crunch_trims_and_collapses() {
        assert_eq!(crunch_text_for_cdata("a  \n\n\n b\t\n"), "a\n b");
        assert_eq!(crunch_text_for_cdata("x\r\ny"), "x\ny");
    }

    #[test]
    fn renders_files_with_attributes() {
        let xml = build_context_xml(&[
            ("src/a.ts".to_string(), 10, "export const a = 1;\n".to_string()),
            ("docs/<b>.md".to_string(), 2, "# B".to_string()),
        ])
        .unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains(r#"<context files="2" tokens="12">"#));
        assert!(xml.contains(r#"<file path="src/a.ts" tokens="10"><![CDATA[export const a = 1;]]></file>"#));
        assert!(xml.contains("docs/&lt;b&gt;.md"));
        assert!(xml.ends_with("</context>"));
    }

    #[test]
    fn cdata_terminator_is_split() {
        let xml = build_context_xml(&[("x".to_string(), 1, "a]]>b".to_string())]).unwrap();
        assert!(xml.contains("<![CDATA[a]]]]><![CDATA[>b]]>"));
    }

    #[test]
    fn empty_snapshot() {
        let xml = build_context_xml(&[]).unwrap();
        assert!(xml.contains(r#"<context files="0" tokens="0"></context>"#));
    }
}
