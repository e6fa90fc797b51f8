// Scientific pitch names ("C2", "F#4", "Bb3") to frequencies.

/// MIDI note number for a pitch name, C4 = 60.
pub fn note_to_midi(name: &str) -> Option<i32> {
    let name = name.trim();
    let mut chars = name.char_indices();
    let (_, letter) = chars.next()?;
    let mut semis = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    // accidentals run until the octave number starts
    let mut octave_start = name.len();
    for (i, c) in chars {
        match c {
            '#' => semis += 1,
            'b' => semis -= 1,
            _ => {
                octave_start = i;
                break;
            }
        }
    }

    let octave: i32 = name[octave_start..].parse().ok()?;
    Some((octave + 1) * 12 + semis)
}

pub fn midi_to_freq(midi: i32) -> f32 {
    // A4 = 440 Hz = MIDI note 69
    440.0 * 2.0_f32.powf((midi as f32 - 69.0) / 12.0)
}

pub fn note_to_freq(name: &str) -> Option<f32> {
    note_to_midi(name).map(midi_to_freq)
}

/// Pitch class of a note name with the octave stripped ("C#4" -> "C#").
pub fn pitch_class(name: &str) -> &str {
    name.trim().trim_end_matches(|c: char| c.is_ascii_digit() || c == '-')
}
