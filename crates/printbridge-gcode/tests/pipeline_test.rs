use printbridge_gcode::{
    line_checksum, process_all, ByteProcessor, NumberingConfig, RewritePipeline,
};
use proptest::prelude::*;

fn rewrite(pipeline: &mut RewritePipeline, input: &str) -> String {
    let out = process_all(pipeline, input.as_bytes()).unwrap();
    String::from_utf8(out).unwrap()
}

fn framed(body: &str) -> String {
    format!("{}*{}\n", body, line_checksum(body.as_bytes()))
}

#[test]
fn test_pipeline_rewrites_and_numbers_lines() {
    let mut pipeline = RewritePipeline::default();
    let out = rewrite(&mut pipeline, "G1  X1.500 ; comment\nG1 Y2.000\n");
    assert_eq!(out, format!("{}{}", framed("N0G1X1.5"), framed("N1G1Y2")));
    assert_eq!(pipeline.next_line_number(), 2);
}

#[test]
fn test_comment_only_and_blank_lines_consume_no_numbers() {
    let mut pipeline = RewritePipeline::default();
    let out = rewrite(&mut pipeline, "; Sliced file\n\n   \nM104 S200.0\n\n");
    assert_eq!(out, framed("N0M104S200"));
}

#[test]
fn test_rollover_through_full_pipeline() {
    let mut pipeline = RewritePipeline::new(NumberingConfig { max_line_number: 1 });
    let out = rewrite(&mut pipeline, "G1 X1\nG1 X2\nG1 X3\n");
    let expected = [
        framed("N0G1X1"),
        framed("N1G1X2"),
        framed("N0M110"),
        framed("N1G1X3"),
    ]
    .concat();
    assert_eq!(out, expected);
}

#[test]
fn test_chunk_boundaries_do_not_matter() {
    let source = "G1 X10.250 Y3.000 ; first\n\nG0 Z0.500\nM117 Hello\n";

    let mut whole = RewritePipeline::default();
    let expected = rewrite(&mut whole, source);

    let mut chunked = RewritePipeline::default();
    let mut out = String::new();
    for chunk in source.as_bytes().chunks(3) {
        out.push_str(&String::from_utf8(process_all(&mut chunked, chunk).unwrap()).unwrap());
    }
    assert_eq!(out, expected);
}

#[test]
fn test_reset_line_on_demand() {
    let mut pipeline = RewritePipeline::default();
    let mut out = Vec::new();
    pipeline
        .emit_reset_line(&mut |b| {
            out.push(b);
            Ok(())
        })
        .unwrap();
    out.extend(process_all(&mut pipeline, b"G28\n").unwrap());
    assert_eq!(
        String::from_utf8(out).unwrap(),
        format!("{}{}", framed("N0M110"), framed("N1G28"))
    );
}

#[test]
fn test_sink_errors_propagate() {
    let mut pipeline = RewritePipeline::default();
    let result = pipeline.process(b'G', &mut |_| Err(printbridge_core::Error::other("sink closed")));
    assert!(result.is_err());
}

fn gcode_line() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[GMXYZEF][0-9]{1,3}(\\.[0-9]{1,4})?",
            Just(" ".to_string()),
            Just("\t".to_string()),
            Just(" ; note".to_string()),
        ],
        0..6,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn prop_every_output_line_is_well_formed(
        lines in prop::collection::vec(gcode_line(), 0..30),
        max_line_number in 1u32..20,
    ) {
        let source = lines.iter().map(|l| format!("{}\n", l)).collect::<String>();
        let mut pipeline = RewritePipeline::new(NumberingConfig { max_line_number });
        let out = rewrite(&mut pipeline, &source);

        prop_assert!(out.is_empty() || out.ends_with('\n'));
        let mut expected_number = 0u32;
        for line in out.lines() {
            let star = line.rfind('*').unwrap();
            let (body, cs) = (&line[..star], &line[star + 1..]);
            prop_assert_eq!(cs.parse::<u8>().unwrap(), line_checksum(body.as_bytes()));
            prop_assert!(body.starts_with('N'));
            prop_assert!(!body.contains(' ') && !body.contains(';') && !body.contains('\t'));

            let digits: String = body[1..].chars().take_while(|c| c.is_ascii_digit()).collect();
            let number: u32 = digits.parse().unwrap();
            prop_assert!(number <= max_line_number);
            if body[1 + digits.len()..].starts_with("M110") && number == 0 {
                expected_number = 1;
            } else {
                prop_assert_eq!(number, expected_number);
                expected_number += 1;
            }
        }
    }

    #[test]
    fn prop_no_trailing_fractional_zeros(whole in 0u32..1000, frac in 0u32..10000) {
        let source = format!("G1X{}.{:04}\n", whole, frac);
        let mut pipeline = RewritePipeline::default();
        let out = rewrite(&mut pipeline, &source);
        let star = out.rfind('*').unwrap();
        let value = &out["N0G1X".len()..star];
        prop_assert!(!value.ends_with('.'));
        if value.contains('.') {
            prop_assert!(!value.ends_with('0'));
        }
        let parsed: f64 = value.parse().unwrap();
        let original: f64 = format!("{}.{:04}", whole, frac).parse().unwrap();
        prop_assert!((parsed - original).abs() < 1e-9);
    }
}
