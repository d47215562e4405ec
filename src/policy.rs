//! Role/points rules that the mobile client re-derived on every screen.
//! Every handler goes through these functions instead.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::models::{Question, Role, User};

pub const GRADE_MIN: u8 = 6;
pub const GRADE_MAX: u8 = 11;

/// Points at which a student becomes a tutor. One-way, no demotion.
pub const TUTOR_THRESHOLD: i64 = 200;

/// Points awarded for submitting an answer.
pub const ANSWER_POINTS: i64 = 5;

pub const ANSWER_MAX_CHARS: usize = 4000;

/// Class averages never drop below this, so a sparse grade yields 2
/// rather than 0 or a division artifact.
pub const CLASS_AVERAGE_FLOOR: i64 = 2;

/// The only legal rating values.
pub static RATING_VALUES: Lazy<HashSet<i64>> =
    Lazy::new(|| [5, 10, 15, 20, 25].into_iter().collect());

/// Parse a classroom/grade string, accepting only the enumerated "6".."11".
pub fn parse_grade(raw: &str) -> Option<u8> {
    let g: u8 = raw.trim().parse().ok()?;
    (GRADE_MIN..=GRADE_MAX).contains(&g).then_some(g)
}

/// A user's effective grade; missing or non-enumerated values default to 6.
pub fn effective_grade(user: &User) -> u8 {
    user.grade
        .as_deref()
        .and_then(parse_grade)
        .unwrap_or(GRADE_MIN)
}

/// Grades whose questions/resources/classrooms the role may see.
/// Teachers see everything, tutors their own grade and below, students
/// exactly their own grade, parents nothing (dashboard only).
pub fn visible_grades(role: &Role, own_grade: u8) -> Vec<u8> {
    match role {
        Role::Teacher => (GRADE_MIN..=GRADE_MAX).collect(),
        Role::Tutor => (GRADE_MIN..=own_grade).collect(),
        Role::Student => vec![own_grade],
        Role::Parent => Vec::new(),
    }
}

/// Whether an item tagged with `classroom` is visible. Items with an
/// unparsable classroom are excluded rather than defaulted.
pub fn can_view(role: &Role, own_grade: u8, classroom: &str) -> bool {
    match parse_grade(classroom) {
        Some(g) => match role {
            Role::Teacher => true,
            Role::Tutor => g <= own_grade,
            Role::Student => g == own_grade,
            Role::Parent => false,
        },
        None => false,
    }
}

/// Feed predicate: visible, and never the viewer's own question.
pub fn answerable(viewer: &User, question: &Question) -> bool {
    can_view(&viewer.role, effective_grade(viewer), &question.classroom)
        && !question.asked_by.eq_ignore_ascii_case(&viewer.email)
}

/// Threshold check run at every write path that touches points, and at
/// login-time role fetch.
pub fn promotes(role: &Role, points: i64) -> bool {
    matches!(role, Role::Student) && points >= TUTOR_THRESHOLD
}

pub fn valid_rating(value: i64) -> bool {
    RATING_VALUES.contains(&value)
}

pub fn validate_answer_text(text: &str) -> Result<(), String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("answer text must not be empty".into());
    }
    if trimmed.chars().count() > ANSWER_MAX_CHARS {
        return Err(format!("answer text exceeds {ANSWER_MAX_CHARS} characters"));
    }
    Ok(())
}

/// Integer class average, floor-clamped. Zero participants yields the
/// floor, never 0 or NaN.
pub fn floored_average(total: i64, count: usize) -> i64 {
    if count == 0 {
        CLASS_AVERAGE_FLOOR
    } else {
        (total / count as i64).max(CLASS_AVERAGE_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role, grade: Option<&str>, points: i64) -> User {
        User {
            id: 1,
            display_name: "T".into(),
            email: "t@example.com".into(),
            role,
            grade: grade.map(|g| g.to_string()),
            subject: None,
            student_email: None,
            points,
            profile_image: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn grade_parsing_accepts_only_enumerated_range() {
        assert_eq!(parse_grade("6"), Some(6));
        assert_eq!(parse_grade(" 11 "), Some(11));
        assert_eq!(parse_grade("5"), None);
        assert_eq!(parse_grade("12"), None);
        assert_eq!(parse_grade("seven"), None);
        assert_eq!(parse_grade(""), None);
    }

    #[test]
    fn missing_grade_defaults_to_six() {
        assert_eq!(effective_grade(&user(Role::Student, None, 0)), 6);
        assert_eq!(effective_grade(&user(Role::Student, Some("banana"), 0)), 6);
        assert_eq!(effective_grade(&user(Role::Student, Some("9"), 0)), 9);
    }

    #[test]
    fn tutor_sees_own_grade_and_below() {
        assert_eq!(visible_grades(&Role::Tutor, 9), vec![6, 7, 8, 9]);
        assert_eq!(visible_grades(&Role::Tutor, 6), vec![6]);
    }

    #[test]
    fn student_sees_exactly_own_grade() {
        assert_eq!(visible_grades(&Role::Student, 7), vec![7]);
        assert!(can_view(&Role::Student, 7, "7"));
        assert!(!can_view(&Role::Student, 7, "8"));
        assert!(!can_view(&Role::Student, 7, "6"));
    }

    #[test]
    fn teacher_sees_all_parent_sees_none() {
        assert_eq!(visible_grades(&Role::Teacher, 6), vec![6, 7, 8, 9, 10, 11]);
        assert!(visible_grades(&Role::Parent, 8).is_empty());
        assert!(!can_view(&Role::Parent, 8, "8"));
    }

    #[test]
    fn unparsable_classroom_is_excluded_not_defaulted() {
        assert!(!can_view(&Role::Teacher, 6, "n/a"));
        assert!(!can_view(&Role::Tutor, 11, ""));
    }

    #[test]
    fn promotion_threshold_is_exact_and_student_only() {
        assert!(!promotes(&Role::Student, 199));
        assert!(promotes(&Role::Student, 200));
        assert!(promotes(&Role::Student, 205));
        assert!(!promotes(&Role::Tutor, 500));
        assert!(!promotes(&Role::Teacher, 500));
    }

    #[test]
    fn own_question_is_never_answerable() {
        let viewer = user(Role::Teacher, None, 0);
        let q = Question {
            id: 1,
            title: "t".into(),
            description: "d".into(),
            subject: "math".into(),
            topic: None,
            classroom: "7".into(),
            asked_by: "T@EXAMPLE.COM".into(),
            asked_by_name: "T".into(),
            image_hash: None,
            upvotes: 0,
            status: crate::models::QuestionStatus::Unanswered,
            created_at: Utc::now(),
        };
        assert!(!answerable(&viewer, &q));
    }

    #[test]
    fn rating_values_are_the_fixed_set() {
        for v in [5, 10, 15, 20, 25] {
            assert!(valid_rating(v));
        }
        for v in [0, 1, 4, 6, 26, 100, -5] {
            assert!(!valid_rating(v));
        }
    }

    #[test]
    fn answer_text_bounds() {
        assert!(validate_answer_text("   ").is_err());
        assert!(validate_answer_text("ok").is_ok());
        assert!(validate_answer_text(&"x".repeat(4000)).is_ok());
        assert!(validate_answer_text(&"x".repeat(4001)).is_err());
    }

    #[test]
    fn class_average_floors_at_two() {
        assert_eq!(floored_average(0, 0), 2);
        assert_eq!(floored_average(0, 5), 2);
        assert_eq!(floored_average(3, 2), 2);
        assert_eq!(floored_average(40, 4), 10);
    }
}
