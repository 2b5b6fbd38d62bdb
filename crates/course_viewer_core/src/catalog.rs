//! crates/course_viewer_core/src/catalog.rs
//!
//! Read-only accessors over one loaded course snapshot.

use crate::domain::{Course, CourseSummary, PlaybackPosition, Video};
use crate::error::{ViewerError, ViewerResult};

#[derive(Debug, Clone)]
pub struct CourseCatalog {
    course: Course,
}

impl CourseCatalog {
    pub fn new(course: Course) -> Self {
        Self { course }
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn course_id(&self) -> &str {
        &self.course.id
    }

    pub fn chapter_count(&self) -> usize {
        self.course.chapters.len()
    }

    pub fn video_count(&self, chapter_index: usize) -> ViewerResult<usize> {
        self.course
            .chapters
            .get(chapter_index)
            .map(|chapter| chapter.videos.len())
            .ok_or_else(|| {
                ViewerError::NotFound(format!(
                    "Chapter {} in course {}",
                    chapter_index, self.course.id
                ))
            })
    }

    pub fn video_at(&self, chapter_index: usize, video_index: usize) -> ViewerResult<&Video> {
        self.course
            .chapters
            .get(chapter_index)
            .and_then(|chapter| chapter.videos.get(video_index))
            .ok_or_else(|| {
                ViewerError::NotFound(format!(
                    "Video ({}, {}) in course {}",
                    chapter_index, video_index, self.course.id
                ))
            })
    }

    pub fn contains(&self, position: PlaybackPosition) -> bool {
        self.video_at(position.chapter_index, position.video_index)
            .is_ok()
    }

    pub fn total_videos(&self) -> usize {
        self.course.chapters.iter().map(|c| c.videos.len()).sum()
    }

    /// The first video of the first non-empty chapter.
    pub fn first_position(&self) -> Option<PlaybackPosition> {
        self.first_video_from(0)
    }

    /// The last video of the last non-empty chapter.
    pub fn last_position(&self) -> Option<PlaybackPosition> {
        self.last_video_before(self.chapter_count())
    }

    /// First video of the first non-empty chapter at or after `chapter_index`.
    pub(crate) fn first_video_from(&self, chapter_index: usize) -> Option<PlaybackPosition> {
        self.course
            .chapters
            .iter()
            .enumerate()
            .skip(chapter_index)
            .find(|(_, chapter)| !chapter.videos.is_empty())
            .map(|(index, _)| PlaybackPosition::new(index, 0))
    }

    /// Last video of the last non-empty chapter strictly before `chapter_index`.
    pub(crate) fn last_video_before(&self, chapter_index: usize) -> Option<PlaybackPosition> {
        self.course
            .chapters
            .iter()
            .enumerate()
            .take(chapter_index)
            .rev()
            .find(|(_, chapter)| !chapter.videos.is_empty())
            .map(|(index, chapter)| PlaybackPosition::new(index, chapter.videos.len() - 1))
    }

    pub fn summary(&self) -> CourseSummary {
        summarize(&self.course)
    }
}

pub(crate) fn summarize(course: &Course) -> CourseSummary {
    CourseSummary {
        id: course.id.clone(),
        title: course.title.clone(),
        description: course.description.clone(),
        image_ref: course.image_ref.clone(),
        chapter_count: course.chapters.len(),
        video_count: course.chapters.iter().map(|c| c.videos.len()).sum(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::{Chapter, Course, Video};

    /// Builds a course whose chapters hold the given number of videos.
    pub(crate) fn course_with(shape: &[usize]) -> Course {
        Course {
            id: "course-1".into(),
            title: "Systems Programming".into(),
            description: "".into(),
            image_ref: None,
            chapters: shape
                .iter()
                .enumerate()
                .map(|(c, &videos)| Chapter {
                    title: format!("Chapter {}", c),
                    videos: (0..videos)
                        .map(|v| Video {
                            title: format!("{}.{}", c, v),
                            media_ref: format!("https://cdn/{}/{}.mp4", c, v),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
