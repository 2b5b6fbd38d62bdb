use chrono::Utc;
use course_viewer_core::engagement::toggle_reaction;
use course_viewer_core::{
    Chapter, Comment, Course, CourseCatalog, CursorStep, PlaybackCursor, PlaybackPosition,
    ReactionKind, Role, Video,
};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashMap;

fn course_with(shape: &[usize]) -> Course {
    Course {
        id: "prop".into(),
        title: "Property Course".into(),
        description: String::new(),
        image_ref: None,
        chapters: shape
            .iter()
            .map(|&videos| Chapter {
                title: String::new(),
                videos: (0..videos)
                    .map(|v| Video {
                        title: format!("v{}", v),
                        media_ref: format!("https://cdn/{}.mp4", v),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn all_positions(shape: &[usize]) -> Vec<PlaybackPosition> {
    shape
        .iter()
        .enumerate()
        .flat_map(|(c, &n)| (0..n).map(move |v| PlaybackPosition::new(c, v)))
        .collect()
}

fn shapes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 1..6).prop_filter("course needs a video", |shape| {
        shape.iter().sum::<usize>() > 0
    })
}

proptest! {
    #[test]
    fn advance_then_retreat_returns_home(shape in shapes(), pick in any::<Index>()) {
        let positions = all_positions(&shape);
        let start = positions[pick.index(positions.len())];
        let catalog = CourseCatalog::new(course_with(&shape));
        let last = catalog.last_position().unwrap();
        let mut cursor = PlaybackCursor::new(catalog, Some(start)).unwrap();

        let step = cursor.advance();
        if start == last {
            prop_assert_eq!(step, CursorStep::CourseComplete { at: start });
        } else {
            prop_assert!(step.moved());
            cursor.retreat();
        }
        prop_assert_eq!(cursor.position(), start);
    }

    #[test]
    fn retreat_then_advance_returns_home(shape in shapes(), pick in any::<Index>()) {
        let positions = all_positions(&shape);
        let start = positions[pick.index(positions.len())];
        let catalog = CourseCatalog::new(course_with(&shape));
        let first = catalog.first_position().unwrap();
        let mut cursor = PlaybackCursor::new(catalog, Some(start)).unwrap();

        let step = cursor.retreat();
        if start == first {
            prop_assert_eq!(step, CursorStep::Stayed { at: start });
        } else {
            prop_assert!(step.moved());
            cursor.advance();
        }
        prop_assert_eq!(cursor.position(), start);
    }

    #[test]
    fn walking_forward_visits_every_video_once(shape in shapes()) {
        let positions = all_positions(&shape);
        let mut cursor = PlaybackCursor::new(CourseCatalog::new(course_with(&shape)), None).unwrap();

        let mut visited = vec![cursor.position()];
        while cursor.advance().moved() {
            visited.push(cursor.position());
        }
        prop_assert_eq!(visited, positions);
    }

    #[test]
    fn reaction_counters_match_recorded_reactions(
        ops in prop::collection::vec((0usize..4, any::<bool>()), 0..40)
    ) {
        let mut comment = Comment {
            id: "c1".into(),
            text: "hello".into(),
            author: "ann".into(),
            author_role: Role::Student,
            created_at: Utc::now(),
            likes: 0,
            dislikes: 0,
            reacted_users: HashMap::new(),
            replies: Vec::new(),
        };

        for (user, like) in ops {
            let user_id = format!("u{}", user);
            let kind = if like { ReactionKind::Like } else { ReactionKind::Dislike };
            let before = comment.reacted_users.get(&user_id).copied();
            let (likes, dislikes) = (comment.likes, comment.dislikes);

            let tally = toggle_reaction(&mut comment, &user_id, kind);

            let expected_likes = comment.reacted_users.values().filter(|k| **k == ReactionKind::Like).count() as u32;
            let expected_dislikes = comment.reacted_users.values().filter(|k| **k == ReactionKind::Dislike).count() as u32;
            prop_assert_eq!(comment.likes, expected_likes);
            prop_assert_eq!(comment.dislikes, expected_dislikes);

            let moved = (comment.likes as i64 - likes as i64).abs() + (comment.dislikes as i64 - dislikes as i64).abs();
            match before {
                Some(prior) if prior != kind => prop_assert_eq!(moved, 2),
                _ => prop_assert_eq!(moved, 1),
            }
            prop_assert_eq!(tally.user_reaction, comment.reacted_users.get(&user_id).copied());
        }
    }
}
