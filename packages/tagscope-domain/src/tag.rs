/// Separates a tag name from its count inside a serialized tag scope cache.
pub const TAG_DETAILS_DELIMITER: char = '|';
/// Separates entries inside a serialized tag scope cache.
pub const NEXT_TAG_DELIMITER: char = '\n';

const FORBIDDEN_TAG_SEQUENCES: [char; 2] = [NEXT_TAG_DELIMITER, TAG_DETAILS_DELIMITER];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TagNameError {
	#[error("Tag name must be non-empty.")]
	Empty,
	#[error("Tag name must not contain {0} char sequence.")]
	Forbidden(&'static str),
}

pub fn normalize_tag_name(raw: &str) -> String {
	raw.to_lowercase()
}

/// Validates a tag name that is about to be created.
pub fn validate_new_tag_name(name: &str) -> Result<(), TagNameError> {
	if name.trim().is_empty() {
		return Err(TagNameError::Empty);
	}

	for sequence in FORBIDDEN_TAG_SEQUENCES {
		if name.contains(sequence) {
			return Err(TagNameError::Forbidden(escape(sequence)));
		}
	}

	Ok(())
}

/// Lower-cases and validates in one step.
pub fn prepare_new_tag_name(raw: &str) -> Result<String, TagNameError> {
	let name = normalize_tag_name(raw);

	validate_new_tag_name(&name)?;

	Ok(name)
}

fn escape(sequence: char) -> &'static str {
	match sequence {
		NEXT_TAG_DELIMITER => "\\n",
		TAG_DETAILS_DELIMITER => "|",
		_ => "?",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reserved_sequences_are_rejected() {
		assert_eq!(validate_new_tag_name("a|b"), Err(TagNameError::Forbidden("|")));
		assert_eq!(validate_new_tag_name("a\nb"), Err(TagNameError::Forbidden("\\n")));
		assert_eq!(validate_new_tag_name("   "), Err(TagNameError::Empty));
		assert_eq!(validate_new_tag_name("plain tag"), Ok(()));
	}

	#[test]
	fn names_are_lower_cased() {
		assert_eq!(prepare_new_tag_name("Alpha").as_deref(), Ok("alpha"));
	}
}
