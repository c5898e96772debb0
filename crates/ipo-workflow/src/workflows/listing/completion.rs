use super::domain::{Section, SectionStatus};

/// Overall completion as the round-half-up mean of the stored section
/// percentages. Zero sections yields 0. The stored percentage is trusted even
/// when it disagrees with the section status.
pub fn overall_completion(sections: &[Section]) -> u8 {
    if sections.is_empty() {
        return 0;
    }

    let total: u32 = sections
        .iter()
        .map(|section| u32::from(section.completion_percentage.min(100)))
        .sum();
    let average = f64::from(total) / sections.len() as f64;
    average.round() as u8
}

/// Section numbers blocking submission, ordered for stable error payloads.
pub fn incomplete_section_numbers(sections: &[Section]) -> Vec<u32> {
    let mut numbers: Vec<u32> = sections
        .iter()
        .filter(|section| section.status != SectionStatus::Completed)
        .map(|section| section.section_number)
        .collect();
    numbers.sort_unstable();
    numbers
}
