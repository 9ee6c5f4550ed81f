use crate::types::VisionChoice;

fn choice(label: &str, text: &str, flag: &str) -> VisionChoice {
    VisionChoice {
        label: label.to_string(),
        text: text.to_string(),
        flag: flag.to_string(),
    }
}

/// Choices offered at the `vision_index`-th vision (beat index / threshold).
pub fn vision_choices(vision_index: usize) -> Vec<VisionChoice> {
    match vision_index {
        1 => vec![
            choice("A", "I see... father's boat!", "triggers_memory_boat"),
            choice("B", "The river... it's calling...", "triggers_memory_river"),
            choice("C", "Where are you?...", "triggers_memory_search"),
        ],
        2 => vec![
            choice("A", "The nahor tree... blooming!", "triggers_memory_tree"),
            choice("B", "I hear singing...", "triggers_memory_song"),
            choice("C", "Help me... please...", "triggers_memory_plea"),
        ],
        _ => vec![
            choice("A", "I remember now...", "triggers_memory_general"),
            choice("B", "The light... it's warm...", "triggers_memory_light"),
            choice("C", "Don't forget me...", "triggers_memory_forget"),
        ],
    }
}
