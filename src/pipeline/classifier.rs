//! Keyword-weighted intent classification.
//!
//! Each intent has a table of Korean and English cue phrases with weights.
//! The message scores the sum of the weights of the cues it contains; the
//! highest score wins and ties go to the intent listed first in
//! [`Intent::ALL`]. A message without any cue is [`Intent::Fallback`].

use crate::core::Intent;
use regex::Regex;
use std::sync::LazyLock;

type CueTable = &'static [(&'static str, u32)];

const RESERVATION_CUES: CueTable = &[
    ("예약", 3),
    ("예약내역", 1),
    ("예약 내역", 1),
    ("예약 조회", 1),
    ("예약조회", 1),
    ("예약 확인", 1),
    ("예약확인", 1),
    ("예약 취소", 1),
    ("예약취소", 1),
    ("예약 변경", 1),
    ("예약변경", 1),
    ("예약 일정", 1),
    ("접수", 2),
    ("reservation", 3),
    ("appointment", 3),
    ("book ", 2),
    ("reschedule", 3),
];

const SYMPTOM_CUES: CueTable = &[
    ("증상", 3),
    ("아파", 3),
    ("아프", 3),
    ("아픈", 3),
    ("통증", 3),
    ("쑤시", 3),
    ("저려", 3),
    ("저림", 3),
    ("어지러", 3),
    ("메스꺼", 3),
    ("구토", 3),
    ("설사", 3),
    ("기침", 3),
    ("가래", 2),
    ("열이", 3),
    ("발열", 3),
    ("두통", 3),
    ("복통", 3),
    ("가려", 2),
    ("부었", 2),
    ("숨이", 2),
    ("symptom", 3),
    ("pain", 3),
    ("hurts", 3),
    ("ache", 3),
    ("fever", 3),
    ("cough", 3),
    ("dizzy", 3),
];

const INFO_CUES: CueTable = &[
    ("진료과", 2),
    ("의료진", 2),
    ("의사", 2),
    ("교수", 2),
    ("전문의", 2),
    ("진료시간", 2),
    ("진료 시간", 2),
    ("운영시간", 2),
    ("위치", 2),
    ("주차", 2),
    ("면회", 2),
    ("전화번호", 2),
    ("연락처", 1),
    ("안내", 1),
    ("알려", 1),
    ("어디", 1),
    ("언제", 1),
    ("department", 2),
    ("doctor", 2),
    ("hours", 2),
    ("parking", 2),
    ("where", 1),
    ("location", 2),
];

/// Weight of each date or time expression ("3시", "5월 2일").
const TIME_EXPRESSION_WEIGHT: u32 = 1;

static TIME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"\d{1,2}\s*월\s*\d{1,2}\s*일", r"\d{1,2}\s*시", r"\b\d{1,2}(:\d{2})?\s*(am|pm)\b"]
        .into_iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

const fn cues(intent: Intent) -> CueTable {
    match intent {
        Intent::ReservationQuery => RESERVATION_CUES,
        Intent::SymptomQuery => SYMPTOM_CUES,
        Intent::InfoQuery => INFO_CUES,
        Intent::Fallback => &[],
    }
}

fn score(intent: Intent, text: &str) -> u32 {
    let mut total: u32 = cues(intent)
        .iter()
        .filter(|(cue, _)| text.contains(cue))
        .map(|(_, weight)| weight)
        .sum();

    if intent == Intent::ReservationQuery {
        let times = TIME_PATTERNS
            .iter()
            .map(|pattern| pattern.find_iter(text).count())
            .sum::<usize>();
        total += u32::try_from(times).unwrap_or(u32::MAX) * TIME_EXPRESSION_WEIGHT;
    }
    total
}

/// Classifies a message.
///
/// Pure and deterministic: the same text always yields the same intent.
///
/// ```
/// use medchat_rs::core::Intent;
/// use medchat_rs::pipeline::classify;
///
/// assert_eq!(classify("진료과를 알려주세요"), Intent::InfoQuery);
/// assert_eq!(classify("안녕"), Intent::Fallback);
/// ```
#[must_use]
pub fn classify(text: &str) -> Intent {
    let text = text.to_lowercase();
    let mut best = (Intent::Fallback, 0);
    for intent in Intent::ALL {
        let score = score(intent, &text);
        if score > best.1 {
            best = (intent, score);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("진료과를 알려주세요", Intent::InfoQuery ; "department list")]
    #[test_case("소아과 의료진 누구 있어요?", Intent::InfoQuery ; "doctor list")]
    #[test_case("주차장은 어디에 있나요", Intent::InfoQuery ; "parking")]
    #[test_case("What are the clinic hours?", Intent::InfoQuery ; "english info")]
    #[test_case("예약 조회 부탁드려요", Intent::ReservationQuery ; "reservation lookup")]
    #[test_case("내과 예약 취소하고 싶어요", Intent::ReservationQuery ; "cancel beats department")]
    #[test_case("5월 3일 10시에 진료 가능할까요", Intent::ReservationQuery ; "time expressions")]
    #[test_case("I need to reschedule my appointment", Intent::ReservationQuery ; "english reservation")]
    #[test_case("머리가 너무 아파요", Intent::SymptomQuery ; "headache")]
    #[test_case("기침이 계속 나는데 어느 진료과로 가야 하나요", Intent::SymptomQuery ; "symptom beats department")]
    #[test_case("I have a fever and a cough", Intent::SymptomQuery ; "english symptom")]
    #[test_case("안녕하세요", Intent::Fallback ; "greeting")]
    #[test_case("", Intent::Fallback ; "empty")]
    #[test_case("ㅋㅋㅋ", Intent::Fallback ; "noise")]
    fn test_classify(text: &str, expected: Intent) {
        assert_eq!(classify(text), expected);
    }

    #[test]
    fn test_ties_follow_priority() {
        // "증상" (symptom 3) against "진료과" + "알려" (info 3)
        assert_eq!(classify("증상에 맞는 진료과 알려줘"), Intent::SymptomQuery);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("APPOINTMENT"), classify("appointment"));
    }

    proptest! {
        #[test]
        fn classify_is_deterministic(text in "\\PC{0,60}") {
            prop_assert_eq!(classify(&text), classify(&text));
        }
    }
}
