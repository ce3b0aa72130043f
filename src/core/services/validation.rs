use crate::core::models::answer::AnswerInput;
use crate::core::models::option::Opt;
use crate::core::models::question::{Question, QuestionType};
use crate::error::Error;

/// The persisted shape of one answer, as loaded for the submit-time
/// completeness check. Derived from stored rows only, never from the
/// request payload, so the check can be re-run idempotently.
#[derive(Debug, Clone, Default)]
pub struct StoredAnswer {
    pub text_value: Option<String>,
    pub selected_count: usize,
}

/// Structural check of a single proposed write against its question.
/// `resolved_options` must contain the rows resolved for the input's
/// (de-duplicated) selected option ids; anything unresolved or owned by
/// another question is rejected.
pub fn validate_answer_shape(question: &Question, input: &AnswerInput, resolved_options: &[Opt]) -> Result<(), Error> {
    let kind = question.kind()?;
    match kind {
        QuestionType::Text => {
            if input.text_value.is_none() {
                return Err(Error::IncompatibleField { question_id: question.id });
            }
            if input.selected_option_ids.as_deref().map_or(false, |ids| !ids.is_empty()) {
                return Err(Error::IncompatibleField { question_id: question.id });
            }
        }
        QuestionType::Checkbox | QuestionType::Radio => {
            if input.text_value.is_some() {
                return Err(Error::IncompatibleField { question_id: question.id });
            }
            let selected = input.selected_set();
            if kind == QuestionType::Radio && selected.len() > 1 {
                return Err(Error::TooManyChoices { question_id: question.id, max: 1 });
            }
            for option_id in selected {
                if !resolved_options.iter().any(|o| o.id == option_id && o.question_id == question.id) {
                    return Err(Error::InvalidOption {
                        question_id: question.id,
                        option_id,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Submit-time completeness check of the persisted answer for one
/// question. A missing row on a required question is missing-required;
/// an existing choice answer is held to the question's count bounds.
pub fn validate_answer_against_question(question: &Question, stored: Option<&StoredAnswer>) -> Result<(), Error> {
    let kind = question.kind()?;
    let stored = match stored {
        Some(stored) => stored,
        None => {
            if question.is_required {
                return Err(Error::MissingRequiredAnswer { question_id: question.id });
            }
            return Ok(());
        }
    };
    match kind {
        QuestionType::Text => {
            if question.is_required && stored.text_value.as_deref().map_or(true, |t| t.trim().is_empty()) {
                return Err(Error::MissingRequiredAnswer { question_id: question.id });
            }
        }
        QuestionType::Checkbox | QuestionType::Radio => {
            let count = stored.selected_count as i32;
            // a cleared selection on an optional question reads as unanswered
            if count == 0 && !question.is_required {
                return Ok(());
            }
            let min = question.min_choices.unwrap_or(if question.is_required { 1 } else { 0 });
            if count < min {
                return Err(Error::TooFewChoices { question_id: question.id, min });
            }
            if let Some(max) = question.max_choices {
                if count > max {
                    return Err(Error::TooManyChoices { question_id: question.id, max });
                }
            }
            if kind == QuestionType::Radio && count > 1 {
                return Err(Error::TooManyChoices { question_id: question.id, max: 1 });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    fn question(type_: &str, is_required: bool, min: Option<i32>, max: Option<i32>) -> Question {
        Question {
            id: 7,
            form_id: 1,
            label: "q".into(),
            type_: type_.into(),
            is_required,
            min_choices: min,
            max_choices: max,
            order_index: 0,
        }
    }

    fn opt(id: i32, question_id: i32) -> Opt {
        Opt {
            id,
            question_id,
            label: format!("opt {}", id),
            value: format!("v{}", id),
            order_index: id,
        }
    }

    fn input(text: Option<&str>, selected: Option<Vec<i32>>) -> AnswerInput {
        AnswerInput {
            question_id: 7,
            text_value: text.map(|t| t.to_string()),
            selected_option_ids: selected,
        }
    }

    #[test]
    fn text_answer_passes_shape() {
        let q = question("text", true, None, None);
        assert!(validate_answer_shape(&q, &input(Some(""), None), &[]).is_ok());
        assert!(validate_answer_shape(&q, &input(Some("hello"), Some(vec![])), &[]).is_ok());
    }

    #[test]
    fn text_answer_with_selection_is_incompatible() {
        let q = question("text", true, None, None);
        let err = validate_answer_shape(&q, &input(Some("hello"), Some(vec![1])), &[opt(1, 7)]).unwrap_err();
        assert!(matches!(err, Error::IncompatibleField { question_id: 7 }));
    }

    #[test]
    fn text_answer_without_text_is_incompatible() {
        let q = question("text", false, None, None);
        let err = validate_answer_shape(&q, &input(None, None), &[]).unwrap_err();
        assert!(matches!(err, Error::IncompatibleField { question_id: 7 }));
    }

    #[test]
    fn choice_answer_with_text_is_incompatible() {
        let q = question("checkbox", false, None, None);
        let err = validate_answer_shape(&q, &input(Some("hello"), Some(vec![1])), &[opt(1, 7)]).unwrap_err();
        assert!(matches!(err, Error::IncompatibleField { question_id: 7 }));
    }

    #[test]
    fn radio_rejects_more_than_one_distinct_option() {
        let q = question("radio", true, None, None);
        let err = validate_answer_shape(&q, &input(None, Some(vec![1, 2])), &[opt(1, 7), opt(2, 7)]).unwrap_err();
        assert!(matches!(err, Error::TooManyChoices { question_id: 7, max: 1 }));
        // duplicates collapse before the count check
        assert!(validate_answer_shape(&q, &input(None, Some(vec![1, 1, 1])), &[opt(1, 7)]).is_ok());
    }

    #[test]
    fn foreign_option_is_invalid() {
        let q = question("checkbox", false, None, None);
        let err = validate_answer_shape(&q, &input(None, Some(vec![1, 9])), &[opt(1, 7), opt(9, 8)]).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { question_id: 7, option_id: 9 }));
    }

    #[test]
    fn unresolved_option_is_invalid() {
        let q = question("radio", false, None, None);
        let err = validate_answer_shape(&q, &input(None, Some(vec![42])), &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { question_id: 7, option_id: 42 }));
    }

    fn stored(text: Option<&str>, count: usize) -> StoredAnswer {
        StoredAnswer {
            text_value: text.map(|t| t.to_string()),
            selected_count: count,
        }
    }

    #[test_case(None ; "missing row")]
    #[test_case(Some("") ; "empty text")]
    #[test_case(Some("   \t") ; "whitespace only")]
    fn required_text_must_be_non_blank(text: Option<&str>) {
        let q = question("text", true, None, None);
        let answer = text.map(|t| stored(Some(t), 0));
        let err = validate_answer_against_question(&q, answer.as_ref()).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredAnswer { question_id: 7 }));
    }

    #[test]
    fn optional_text_may_stay_blank() {
        let q = question("text", false, None, None);
        assert!(validate_answer_against_question(&q, None).is_ok());
        assert!(validate_answer_against_question(&q, Some(&stored(Some(""), 0))).is_ok());
    }

    #[test]
    fn missing_required_choice_answer_is_missing_required() {
        let q = question("radio", true, None, None);
        let err = validate_answer_against_question(&q, None).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredAnswer { question_id: 7 }));
    }

    // required + unset min defaults to an effective minimum of one
    #[test_case(true, None, None, 0, Some(1) ; "required default min")]
    #[test_case(true, None, None, 1, None ; "required satisfied")]
    #[test_case(true, Some(2), None, 1, Some(2) ; "explicit min unmet")]
    #[test_case(true, Some(2), None, 2, None ; "explicit min met")]
    #[test_case(false, Some(2), None, 1, Some(2) ; "optional but answered below min")]
    #[test_case(false, Some(2), None, 0, None ; "optional left unanswered skips min")]
    fn checkbox_min_bounds(is_required: bool, min: Option<i32>, max: Option<i32>, count: usize, expect_min: Option<i32>) {
        let q = question("checkbox", is_required, min, max);
        let res = validate_answer_against_question(&q, Some(&stored(None, count)));
        match expect_min {
            None => assert!(res.is_ok()),
            Some(expected) => {
                assert!(matches!(res.unwrap_err(), Error::TooFewChoices { question_id: 7, min } if min == expected))
            }
        }
    }

    #[test_case(2, 3, None ; "within max")]
    #[test_case(2, 2, None ; "at max")]
    #[test_case(3, 2, Some(2) ; "over max")]
    fn checkbox_max_bounds(count: usize, max: i32, expect_max: Option<i32>) {
        let q = question("checkbox", false, None, Some(max));
        let res = validate_answer_against_question(&q, Some(&stored(None, count)));
        match expect_max {
            None => assert!(res.is_ok()),
            Some(expected) => {
                assert!(matches!(res.unwrap_err(), Error::TooManyChoices { question_id: 7, max } if max == expected))
            }
        }
    }

    #[test]
    fn required_radio_needs_exactly_one() {
        let q = question("radio", true, Some(1), Some(1));
        assert!(matches!(
            validate_answer_against_question(&q, Some(&stored(None, 0))).unwrap_err(),
            Error::TooFewChoices { question_id: 7, min: 1 }
        ));
        assert!(validate_answer_against_question(&q, Some(&stored(None, 1))).is_ok());
        assert!(matches!(
            validate_answer_against_question(&q, Some(&stored(None, 2))).unwrap_err(),
            Error::TooManyChoices { question_id: 7, .. }
        ));
    }

    #[test]
    fn optional_radio_allows_zero_or_one() {
        let q = question("radio", false, None, None);
        assert!(validate_answer_against_question(&q, Some(&stored(None, 0))).is_ok());
        assert!(validate_answer_against_question(&q, Some(&stored(None, 1))).is_ok());
        assert!(matches!(
            validate_answer_against_question(&q, Some(&stored(None, 2))).unwrap_err(),
            Error::TooManyChoices { question_id: 7, max: 1 }
        ));
    }
}
