//! Recorded-style responses for every family
//!
//! A parked car on a charger: speed zero, battery current positive. The
//! simulated adapter answers from these tables, and the decoder tests
//! check the values noted next to each field.

use crate::model::VehicleFamily;

/// `(header, request, payload)`
pub type SampleResponse = (&'static str, &'static str, String);

/// Hyundai/Kia TPMS answer: FL 185/61, FR 180/62, RR 180/61, RL 187/60
pub const HYUNDAI_TPMS_PAYLOAD: &str = "62C00BFFFF0000B93D0100B43E0100B43D0100BB3C0100AAAAAAAA";

/// Sample responses for `family`, in polling order
pub fn responses(family: VehicleFamily) -> Vec<SampleResponse> {
    match family {
        VehicleFamily::KiaEniro => kia_eniro(),
        VehicleFamily::HyundaiIoniq => hyundai_ioniq(),
        VehicleFamily::Egmp => egmp(),
        VehicleFamily::RenaultZoe => renault_zoe(),
        VehicleFamily::BmwI3 => bmw_i3(),
        VehicleFamily::Meb => meb(),
    }
}

/// Extended address selecting the BMW i3 module that answers `request`
pub fn bmw_extended_address(request: &str) -> u8 {
    match request {
        "22D10D" => 0x60,
        "22DE8A" => 0x78,
        _ => 0x07,
    }
}

/// `len` nibbles starting with `prefix`, zero filled, with each
/// `(position, digits)` written in place
fn frame(prefix: &str, len: usize, fields: &[(usize, &str)]) -> String {
    let mut digits: Vec<u8> = vec![b'0'; len.max(prefix.len())];
    digits[..prefix.len()].copy_from_slice(prefix.as_bytes());
    for (start, value) in fields {
        let end = start + value.len();
        if end > digits.len() {
            digits.resize(end, b'0');
        }
        digits[*start..end].copy_from_slice(value.as_bytes());
    }
    String::from_utf8_lossy(&digits).into_owned()
}

/// Cell bank answer: identifier echo, four filler bytes, then the cells
fn cell_bank(prefix: &str, cell: &str, count: usize) -> String {
    format!("{prefix}FFFFFFFF{}", cell.repeat(count))
}

fn kia_eniro() -> Vec<SampleResponse> {
    vec![
        // Ignition on, lights off
        ("770", "22BC03", frame("62BC03", 24, &[(16, "20"), (18, "00"), (20, "00")])),
        // Standing still
        ("7E2", "2101", frame("6101", 40, &[(32, "0000")])),
        // 12V: 1.2 A, 85 %
        ("7E2", "2102", frame("6102", 56, &[(46, "FB50"), (50, "55")])),
        (
            "7E4",
            "220101",
            frame(
                "620101",
                124,
                &[
                    (16, "4650"),     // 180 kW charge
                    (20, "4650"),     // 180 kW discharge
                    (26, "FE0C"),     // 50 A in
                    (30, "0E10"),     // 360 V
                    (38, "14151316"), // modules 0..4
                    (48, "C4"),       // 3.92 V
                    (50, "12"),       // inlet 18
                    (52, "C3"),       // 3.90 V
                    (64, "8E"),       // 14.2 V
                    (82, "0001E240"), // 12345.6 kWh
                    (90, "0001CFED"), // 11876.5 kWh
                    (118, "03E8"),    // 1000 kOhm
                ],
            ),
        ),
        ("7E4", "220102", cell_bank("620102", "C3C4", 16)),
        ("7E4", "220103", cell_bank("620103", "C3C4", 16)),
        ("7E4", "220104", cell_bank("620104", "C3C4", 16)),
        (
            "7E4",
            "220105",
            frame(
                "620105",
                78,
                &[
                    (22, "1414151513131414"), // modules 4..12
                    (52, "0F"),               // heater 15
                    (56, "03E8"),             // SoH 100.0
                    (68, "6F"),               // SoC 55.5
                    (74, "C3C4"),             // cells 96, 97
                ],
            ),
        ),
        ("7E4", "220106", frame("620106", 16, &[(14, "11")])),
        // Cabin 21.5, outside 12.0
        ("7B3", "220100", frame("620100", 20, &[(16, "7B"), (18, "68")])),
        ("7B3", "220102", frame("620102", 16, &[(12, "00"), (14, "72")])),
        ("7A0", "22C00B", HYUNDAI_TPMS_PAYLOAD.to_string()),
        // 23456 km
        ("7C6", "22B002", frame("62B002", 24, &[(18, "005BA0")])),
    ]
}

fn hyundai_ioniq() -> Vec<SampleResponse> {
    vec![
        (
            "7E4",
            "2101",
            frame(
                "6101",
                112,
                &[
                    (16, "2648"),       // 98 kW
                    (20, "2648"),
                    (24, "FED4"),       // 30 A in
                    (28, "0E74"),       // 370 V
                    (36, "1819181718"), // modules 0..5
                    (48, "16"),         // inlet 22
                    (50, "C6"),         // 3.96 V
                    (54, "C5"),         // 3.94 V
                    (62, "8A"),         // 13.8 V
                    (66, "90"),         // SoC 72.0
                    (80, "0000D431"),   // 5432.1 kWh
                    (88, "0000C3CB"),   // 5012.3 kWh
                ],
            ),
        ),
        ("7E4", "2102", cell_bank("6102", "C5C6", 16)),
        ("7E4", "2103", cell_bank("6103", "C5C6", 16)),
        ("7E4", "2104", cell_bank("6104", "C5C6", 16)),
        (
            "7E4",
            "2105",
            frame("6105", 58, &[(22, "18181818181818"), (50, "14"), (54, "03D9")]),
        ),
        ("7E2", "2101", frame("6101", 36, &[(32, "0000")])),
        // 45678 km
        ("7C6", "22B002", frame("62B002", 24, &[(18, "00B26E")])),
        ("7A0", "22C00B", HYUNDAI_TPMS_PAYLOAD.to_string()),
    ]
}

fn egmp() -> Vec<SampleResponse> {
    vec![
        (
            "7E4",
            "220101",
            frame(
                "620101",
                122,
                &[
                    (16, "61A8"),       // 250 kW
                    (20, "61A8"),
                    (24, "FB50"),       // 120 A in
                    (28, "1964"),       // 650 V
                    (36, "1E1F1E1D1E"), // modules 0..5
                    (48, "1C"),         // inlet 28
                    (50, "BE"),         // 3.80 V
                    (54, "BD"),         // 3.78 V
                    (62, "90"),         // 14.4 V
                    (82, "00015666"),   // 8765.4 kWh
                    (90, "00013D4E"),   // 8123.0 kWh
                    (118, "0BB8"),      // 3000 kOhm
                ],
            ),
        ),
        ("7E4", "220102", cell_bank("620102", "BDBE", 16)),
        ("7E4", "220103", cell_bank("620103", "BDBE", 16)),
        ("7E4", "220104", cell_bank("620104", "BDBE", 16)),
        ("7E4", "22010A", cell_bank("62010A", "BDBE", 16)),
        ("7E4", "22010B", cell_bank("62010B", "BDBE", 16)),
        ("7E4", "22010C", cell_bank("62010C", "BDBE", 16)),
        (
            "7E4",
            "220105",
            frame(
                "620105",
                70,
                &[
                    (22, "1E1E1E1E1E1E1E1E1E1E1E"), // modules 5..16
                    (52, "19"),                     // heater 25
                    (56, "03E8"),                   // SoH 100.0
                    (68, "78"),                     // SoC 60.0
                ],
            ),
        ),
        ("7E4", "220106", frame("620106", 16, &[(14, "1A")])),
        ("7E2", "22E004", frame("62E004", 34, &[(30, "0000")])),
        // 12345 km
        ("7C6", "22B002", frame("62B002", 24, &[(18, "003039")])),
        ("7A0", "22C00B", HYUNDAI_TPMS_PAYLOAD.to_string()),
    ]
}

fn renault_zoe() -> Vec<SampleResponse> {
    vec![
        ("7E4", "222002", "6220020FA0".to_string()), // SoC 80.0
        ("7E4", "222003", "6220030000".to_string()),
        ("7E4", "222005", "622005059B".to_string()), // 14.35 V
        ("7E4", "223206", "6232065F".to_string()),   // SoH 95
        ("7E4", "22300F", "62300F0898".to_string()), // 22 kW
        // 30 A in, 390 V, 4567.8 / 4321.0 kWh
        ("79B", "2101", "6101012C0F3C0000B26E0000A8CA".to_string()),
        ("79B", "2103", "610309C4".to_string()),
        // Twelve modules at 15 degrees
        ("79B", "2104", format!("61040000{}", "370000".repeat(12))),
        // 3.950 V per cell
        ("79B", "2141", format!("6141{}", "0F6E".repeat(62))),
        ("79B", "2142", format!("6142{}", "0F6E".repeat(34))),
        // 56789 km
        ("743", "220206", "6202060000DDD5".to_string()),
    ]
}

fn bmw_i3() -> Vec<SampleResponse> {
    vec![
        ("6F1", "22DD68", "62DD688CA0".to_string()),     // 360.00 V
        ("6F1", "22DD69", "62DD69000009C4".to_string()), // 25.00 A
        ("6F1", "22DDBC", "62DDBC028A".to_string()),     // SoC 65.0
        // Min 18.00, max 21.00, average 19.50
        ("6F1", "22DDC0", "62DDC007080834079E".to_string()),
        ("6F1", "22DD6C", "62DD6C00D2".to_string()),     // coolant 21.0
        ("6F1", "22D10D", "62D10D00008707".to_string()), // 34567 km
        ("6F1", "22DE8A", "62DE8A0000".to_string()),
    ]
}

fn meb() -> Vec<SampleResponse> {
    vec![
        ("17FC007B", "22028C", "62028CAF".to_string()),     // SoC 70.0
        ("17FC007B", "221E3B", "621E3B0640".to_string()),   // 400 V
        ("17FC007B", "221E3D", "621E3D0251C0".to_string()), // 20 A in
        // Max 24, min 22, average 23
        ("17FC007B", "221E0E", "621E0E0600058005C0".to_string()),
        // 3456.789 / 3210.500 kWh
        ("17FC007B", "222A0B", "622A0B0034BF150030FD04".to_string()),
        ("17FC0076", "222203", "622203003A98".to_string()), // 15000 km
        ("17FC0010", "22F40D", "62F40D00".to_string()),
    ]
}
