//! End-to-end brim rewrites on Cura-shaped G-code.

use tabplus_gcode::{
    rewrite, rewrite_text, BrimMode, CompressSettings, DuplicateSettings, GcodeDocument,
    GcodeError, Line, BEGIN_MARKER, END_MARKER,
};

const HEADER: &str = "\
;FLAVOR:Marlin
;TIME:1234
;Generated with Cura_SteamEngine 5.0.0
M82 ;absolute extrusion mode
G28
G92 E0
G1 F2700 E-5
;LAYER_COUNT:5";

fn layer0_plain() -> &'static str {
    "\
;LAYER:0
M107
G0 F6000 X106.445 Y116.579 Z0.2
;TYPE:SKIRT
G1 F2700 E0
G1 F1200 X106.693 Y116.356 E0.011
G1 X107.12 Y116.1 E0.0275
G1 X107.5 Y116.4 E0.04
;MESH:cube.stl
G0 F6000 X110 Y110
;TYPE:WALL-OUTER
G1 F1200 X120 Y110 E0.5
G1 X120 Y120 E1.0
G1 F2700 E-4"
}

fn upper_layers(from: usize, to: usize) -> String {
    (from..=to)
        .map(|n| {
            let z = 0.2 * (n + 1) as f64;
            let e = 1.0 + 0.5 * n as f64;
            format!(
                ";LAYER:{n}\n\
                 G0 F6000 X110 Y110 Z{z:.1}\n\
                 G1 F2700 E{prev:.1}\n\
                 ;TYPE:WALL-OUTER\n\
                 G1 F1200 X120 Y110 E{e:.1}\n\
                 G1 F2700 E{retract:.1}",
                prev = e - 0.5,
                retract = e - 5.0
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn sample() -> String {
    format!("{HEADER}\n{}\n{}\n;End of Gcode\nM84", layer0_plain(), upper_layers(1, 4))
}

fn replay_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in text.lines() {
        match line {
            BEGIN_MARKER => current = Some(Vec::new()),
            END_MARKER => blocks.extend(current.take()),
            _ => {
                if let Some(block) = current.as_mut() {
                    block.push(line);
                }
            }
        }
    }
    blocks
}

fn z_of(text: &str) -> Option<f64> {
    Line::parse(text).unwrap().motion().and_then(|m| m.z)
}

#[test]
fn test_duplicate_inserts_one_replay_per_layer() {
    let text = sample();
    let mode = BrimMode::Duplicate(DuplicateSettings { layers: 2 });
    let (out, report) = rewrite_text(&text, &mode).unwrap();

    assert_eq!(report.replays, 2);
    assert_eq!(report.blocks_changed, 2);
    let blocks = replay_blocks(&out);
    assert_eq!(blocks.len(), 2);

    // Replays sit right after their layer markers.
    assert!(out.contains(&format!(";LAYER:1\n{BEGIN_MARKER}")));
    assert!(out.contains(&format!(";LAYER:2\n{BEGIN_MARKER}")));
    assert!(!out.contains(&format!(";LAYER:3\n{BEGIN_MARKER}")));
}

#[test]
fn test_duplicate_replay_content() {
    let text = sample();
    let mode = BrimMode::Duplicate(DuplicateSettings { layers: 1 });
    let (out, _) = rewrite_text(&text, &mode).unwrap();
    let blocks = replay_blocks(&out);
    assert_eq!(
        blocks[0],
        vec![
            "G1 F2700 E1.0",
            "G92 E0.0",
            "G0 F6000 X106.445 Y116.579 Z0.4",
            ";TYPE:SKIRT",
            "G1 F2700 E0",
            "G1 F1200 X106.693 Y116.356 E0.011",
            "G1 X107.12 Y116.1 E0.0275",
            "G1 X107.5 Y116.4 E0.04",
            "G1 F2700 E-4.96",
            "G0 F6000 X110 Y110",
            "G1 Z0.2",
            "G92 E-4.0",
        ]
    );
}

#[test]
fn test_duplicate_replays_climb_strictly() {
    let text = sample();
    let mode = BrimMode::Duplicate(DuplicateSettings { layers: 4 });
    let (out, report) = rewrite_text(&text, &mode).unwrap();
    assert_eq!(report.replays, 4);

    let start_heights: Vec<f64> = replay_blocks(&out)
        .iter()
        .map(|block| {
            block
                .iter()
                .find_map(|line| z_of(line))
                .expect("replay carries a Z move")
        })
        .collect();
    assert_eq!(start_heights.len(), 4);
    for pair in start_heights.windows(2) {
        assert!(pair[1] > pair[0], "{start_heights:?}");
    }
    approx::assert_relative_eq!(start_heights[0], 0.4, epsilon = 1e-9);
    approx::assert_relative_eq!(start_heights[3], 1.0, epsilon = 1e-9);
}

#[test]
fn test_duplicate_leaves_later_layers_byte_identical() {
    let text = sample();
    let before = GcodeDocument::parse(&text);
    let mut after = before.clone();
    rewrite(
        &mut after,
        &BrimMode::Duplicate(DuplicateSettings { layers: 2 }),
    )
    .unwrap();

    assert_eq!(before.len(), after.len());
    for (index, (a, b)) in before.blocks().iter().zip(after.blocks()).enumerate() {
        // preamble, layer 0, layers 3 and 4
        if ![2, 3].contains(&index) {
            assert_eq!(a, b, "block {index} changed");
        }
    }
}

#[test]
fn test_duplicate_handles_z_hop_before_skirt() {
    let text = format!(
        "{HEADER}\n\
         ;LAYER:0\n\
         G0 F6000 X51.318 Y121.726 Z0.4\n\
         ;TYPE:SKIRT\n\
         G1 F300 Z0.2\n\
         G1 F3000 E0\n\
         G1 F1080 X51.568 Y121.624 E0.0089\n\
         G1 X51.8 Y121.5 E0.02\n\
         ;TYPE:WALL-INNER\n\
         G1 X60 Y121.5 E0.5\n\
         {}",
        upper_layers(1, 2)
    );
    let (out, report) = rewrite_text(
        &text,
        &BrimMode::Duplicate(DuplicateSettings { layers: 1 }),
    )
    .unwrap();
    assert_eq!(report.replays, 1);
    let block = &replay_blocks(&out)[0];
    assert!(block.contains(&"G0 F6000 X51.318 Y121.726 Z0.6"));
    assert!(block.contains(&"G1 F300 Z0.4"));
    assert!(block.contains(&"G92 E0.0"));
}

#[test]
fn test_duplicate_z_only_move_before_skirt() {
    let layer0 = layer0_plain().replace(
        "G0 F6000 X106.445 Y116.579 Z0.2\n",
        "G0 F6000 X106.445 Y116.579\nG0 Z0.2\n",
    );
    let text = format!("{HEADER}\n{layer0}\n{}", upper_layers(1, 2));
    let (out, report) = rewrite_text(
        &text,
        &BrimMode::Duplicate(DuplicateSettings { layers: 2 }),
    )
    .unwrap();
    assert_eq!(report.replays, 2);

    let blocks = replay_blocks(&out);
    // Z first, then a travel to where the skirt starts.
    assert_eq!(&blocks[0][2..4], ["G0 Z0.4", "G0 X106.445 Y116.579"]);
    assert_eq!(&blocks[1][2..4], ["G0 Z0.6", "G0 X106.445 Y116.579"]);
    assert!(blocks[0].contains(&"G1 F1200 X106.693 Y116.356 E0.011"));
}

#[test]
fn test_duplicate_skirt_without_any_xy_is_skipped() {
    let text = format!(
        "{HEADER}\n\
         ;LAYER:0\n\
         ;TYPE:SKIRT\n\
         G1 F1200 X106.693 Y116.356 E0.011\n\
         ;TYPE:WALL-OUTER\n\
         G1 X120 Y110 E0.5\n\
         {}",
        upper_layers(1, 2)
    );
    let (out, report) = rewrite_text(
        &text,
        &BrimMode::Duplicate(DuplicateSettings { layers: 2 }),
    )
    .unwrap();
    assert_eq!(report.replays, 0);
    assert_eq!(out, text);
}

#[test]
fn test_duplicate_relative_extrusion_has_no_position_resets() {
    let text = sample().replace("M82 ;absolute extrusion mode", "M83 ;relative extrusion mode");
    let (out, report) = rewrite_text(
        &text,
        &BrimMode::Duplicate(DuplicateSettings { layers: 2 }),
    )
    .unwrap();
    assert_eq!(report.replays, 2);
    let blocks = replay_blocks(&out);
    for block in &blocks {
        assert!(block.iter().all(|line| !line.starts_with("G92")), "{block:?}");
    }
    // No unretract either: the replay opens with the shifted start move.
    assert_eq!(blocks[0][0], "G0 F6000 X106.445 Y116.579 Z0.4");
    assert_eq!(blocks[1][0], "G0 F6000 X106.445 Y116.579 Z0.6");
}

#[test]
fn test_duplicate_without_skirt_is_identity() {
    let text = sample().replace(";TYPE:SKIRT", ";TYPE:WALL-INNER");
    let (out, report) = rewrite_text(
        &text,
        &BrimMode::Duplicate(DuplicateSettings { layers: 3 }),
    )
    .unwrap();
    assert_eq!(report.replays, 0);
    assert_eq!(out, text);
}

#[test]
fn test_negative_layers_never_replay() {
    let text = format!(
        "{HEADER}\n;LAYER:-2\nG0 F6000 X1 Y1 Z0.3\n;LAYER:-1\nG0 F6000 X1 Y1 Z0.5\n{}\n{}",
        layer0_plain(),
        upper_layers(1, 1)
    );
    let (out, report) = rewrite_text(
        &text,
        &BrimMode::Duplicate(DuplicateSettings { layers: 1 }),
    )
    .unwrap();
    assert_eq!(report.replays, 1);
    assert!(out.contains(";LAYER:-1\nG0 F6000 X1 Y1 Z0.5"));
}

#[test]
fn test_malformed_coordinate_aborts_and_keeps_document() {
    let text = format!("{}\n;LAYER:5\nG1 X12.5 Y E3", sample());
    let mut doc = GcodeDocument::parse(&text);
    let err = rewrite(
        &mut doc,
        &BrimMode::Duplicate(DuplicateSettings { layers: 2 }),
    )
    .unwrap_err();
    assert!(matches!(err, GcodeError::At { .. }));
    assert_eq!(doc.to_text(), text);
}

fn compress(text: &str, settings: CompressSettings) -> (String, tabplus_gcode::RewriteReport) {
    rewrite_text(text, &BrimMode::Compress(settings)).unwrap()
}

#[test]
fn test_compress_squashes_brim_and_scales_flow() {
    let text = sample();
    let (out, report) = compress(&text, CompressSettings::default());
    assert_eq!(report.sections_compressed, 1);
    assert_eq!(report.flow_percent, Some(40));

    let expected_entry = format!(";TYPE:SKIRT\n{BEGIN_MARKER}\nG0 Z0.08\nM221 S40\nG1 F2700 E0");
    assert!(out.contains(&expected_entry), "{out}");
    let expected_exit = format!("G1 X107.5 Y116.4 E0.04\nM221 S100\n{END_MARKER}\n;MESH:cube.stl");
    assert!(out.contains(&expected_exit), "{out}");
    // Upper layers untouched.
    assert!(out.ends_with(&format!("{}\n;End of Gcode\nM84", upper_layers(1, 4))));
}

#[test]
fn test_compress_restores_first_nominal_z_after_brim() {
    let text = sample().replace(
        "G0 F6000 X110 Y110\n;TYPE:WALL-OUTER",
        "G0 F6000 X110 Y110\nG1 F300 Z0.2\n;TYPE:WALL-OUTER\nG1 F300 Z0.2",
    );
    let (out, _) = compress(&text, CompressSettings::default());
    assert!(out.contains("G0 F6000 X110 Y110\nG1 F300 Z0.08\n;TYPE:WALL-OUTER\nG1 F300 Z0.2"));
    let restored: Vec<f64> = out
        .lines()
        .filter(|l| l.starts_with("G1 F300 Z"))
        .filter_map(z_of)
        .collect();
    assert_eq!(restored, vec![0.08, 0.2]);
}

#[test]
fn test_compress_with_hop_inside_brim_returns_to_nominal() {
    let text = sample().replace(
        "G1 X107.12 Y116.1 E0.0275",
        "G1 F300 Z0.4\nG0 F6000 X107.12 Y116.1\nG1 F300 Z0.2",
    );
    let (out, _) = compress(&text, CompressSettings::default());
    assert!(out.contains("G1 F300 Z0.4\nG0 F6000 X107.12 Y116.1\nG1 F300 Z0.08"));
    assert!(out.contains(&format!("M221 S100\nG0 Z0.2\n{END_MARKER}")));
}

#[test]
fn test_compress_only_touches_selected_extruder() {
    let text = sample().replace("M107\n", "M107\nT1\n");
    let (out, report) = compress(&text, CompressSettings::default());
    assert_eq!(report.sections_compressed, 0);
    assert_eq!(out, text);

    let (out, report) = compress(
        &text,
        CompressSettings {
            extruder: 2,
            ..Default::default()
        },
    );
    assert_eq!(report.sections_compressed, 1);
    assert!(out.contains("M221 S40"));
}

#[test]
fn test_compress_lcd_feedback_only_adds_messages() {
    let text = sample();
    let (plain, _) = compress(&text, CompressSettings::default());
    let (lcd, _) = compress(
        &text,
        CompressSettings {
            lcd_feedback: true,
            ..Default::default()
        },
    );
    assert!(lcd.contains("M117 "));
    let stripped: Vec<&str> = lcd.lines().filter(|l| !l.starts_with("M117")).collect();
    assert_eq!(stripped, plain.lines().collect::<Vec<_>>());
}

#[test]
fn test_compress_without_skirt_round_trips() {
    let text = sample().replace(";TYPE:SKIRT", ";TYPE:WALL-INNER");
    let mut doc = GcodeDocument::parse(&text);
    let report = rewrite(&mut doc, &BrimMode::Compress(CompressSettings::default())).unwrap();
    assert_eq!(report.blocks_changed, 0);
    assert_eq!(report.flow_percent, None);
    assert_eq!(doc.to_text(), text);
}

#[test]
fn test_compress_rejects_out_of_range_reduce() {
    let mut doc = GcodeDocument::parse(&sample());
    let err = rewrite(
        &mut doc,
        &BrimMode::Compress(CompressSettings {
            reduce: 0.5,
            ..Default::default()
        }),
    )
    .unwrap_err();
    assert!(matches!(err, GcodeError::InvalidSettings(_)));
}
