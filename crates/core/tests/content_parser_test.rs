use folio_core::interp::{ContentParser, parse_content_stream};
use folio_core::{DiagnosticKind, Value};

#[test]
fn test_operator_offsets() {
    let content = b"q\n1 0 0 1 0 0 cm % comment\nQ";
    let ops = parse_content_stream(content);
    let names: Vec<_> = ops.iter().map(|op| op.operator.as_str()).collect();
    assert_eq!(names, ["q", "cm", "Q"]);
    assert_eq!(ops[0].offset, 0);
    assert_eq!(ops[1].offset, 14);
    assert_eq!(&content[ops[2].offset..], b"Q");
}

#[test]
fn test_quote_operators() {
    let ops = parse_content_stream(b"(line) ' 1 2 (x) \"");
    assert_eq!(ops[0].operator, "'");
    assert_eq!(ops[0].operands[0], Value::String(b"line".to_vec()));
    assert_eq!(ops[1].operator, "\"");
    assert_eq!(ops[1].operands.len(), 3);
}

#[test]
fn test_procedure_braces_become_arrays() {
    let ops = parse_content_stream(b"{ 1 2 } /P sh");
    assert_eq!(
        ops[0].operands[0],
        Value::Array(vec![Value::Int(1), Value::Int(2)])
    );
}

#[test]
fn test_unterminated_array_collapses() {
    let mut parser = ContentParser::new(b"[1 2 re 0 0 m");
    let ops: Vec<_> = parser.by_ref().collect();
    assert_eq!(ops.len(), 2);
    assert_eq!(
        ops[0].operands[0],
        Value::Array(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(ops[1].operator, "m");
    let diags = parser.take_diagnostics();
    assert_eq!(diags.count(DiagnosticKind::MalformedToken), 1);
}

#[test]
fn test_trailing_operands_reported() {
    let mut parser = ContentParser::new(b"0 0 m 5 5");
    assert_eq!(parser.by_ref().count(), 1);
    assert_eq!(
        parser.take_diagnostics().count(DiagnosticKind::MalformedToken),
        1
    );
}

#[test]
fn test_inline_image_mask_size() {
    // 10x2 mask: ceil(10 / 8) = 2 bytes per row
    let mut content = b"BI /W 10 /H 2 /IM true ID ".to_vec();
    content.extend_from_slice(b"EIEI");
    content.extend_from_slice(b"\nEI 0 g");
    let ops = parse_content_stream(&content);
    let image = ops[0].inline_image.as_ref().unwrap();
    assert_eq!(image.data.as_ref(), b"EIEI");
    assert_eq!(image.params.get("ImageMask"), Some(&Value::Bool(true)));
    assert_eq!(ops[1].operator, "g");
}

#[test]
fn test_inline_image_filter_array_expanded() {
    let ops = parse_content_stream(b"BI /W 1 /H 1 /F [/AHx] ID 00> EI");
    let image = ops[0].inline_image.as_ref().unwrap();
    assert_eq!(
        image.params.get("Filter"),
        Some(&Value::Array(vec![Value::name("ASCIIHexDecode")]))
    );
    assert_eq!(image.data.as_ref(), b"00>");
}

#[test]
fn test_inline_image_without_id() {
    let mut parser = ContentParser::new(b"BI /W 1 /H 1");
    let ops: Vec<_> = parser.by_ref().collect();
    assert_eq!(ops.len(), 1);
    assert!(ops[0].inline_image.as_ref().unwrap().data.is_empty());
    assert_eq!(
        parser.take_diagnostics().count(DiagnosticKind::MalformedToken),
        1
    );
}

#[test]
fn test_deep_operand_nesting_is_bounded() {
    let mut content = b"[".repeat(10_000);
    content.extend_from_slice(&b"]".repeat(10_000));
    content.extend_from_slice(b" 0 0 m");
    let mut parser = ContentParser::new(&content);
    let ops: Vec<_> = parser.by_ref().collect();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].operator, "m");
    assert_eq!(ops[0].operands.len(), 3);
    assert_eq!(
        parser.take_diagnostics().count(DiagnosticKind::MalformedToken),
        1
    );
}

#[test]
fn test_deep_inline_image_parameter() {
    let mut content = b"BI /D ".to_vec();
    content.extend_from_slice(&b"[".repeat(10_000));
    content.extend_from_slice(b" ID x EI 0 g");
    let mut parser = ContentParser::new(&content);
    let ops: Vec<_> = parser.by_ref().collect();
    assert_eq!(ops[0].operator, "BI");
    assert!(!ops[0].inline_image.as_ref().unwrap().params.contains_key("Decode"));
    assert_eq!(ops.last().unwrap().operator, "g");
    assert_eq!(
        parser.take_diagnostics().count(DiagnosticKind::MalformedToken),
        1
    );
}
