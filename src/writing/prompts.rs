use uuid::Uuid;

use super::project::Project;
use super::refine::Critique;
use super::suggestions::SuggestionType;

/// Project and chapter facts that frame every chapter-scoped prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterContext {
    pub project_title: String,
    pub synopsis: Option<String>,
    pub chapter_title: String,
    pub chapter_summary: String,
}

impl ChapterContext {
    pub fn from_project(project: &Project, chapter_id: Uuid) -> Option<Self> {
        let chapter = project.chapter(chapter_id)?;
        Some(Self {
            project_title: project.title.clone(),
            synopsis: project.synopsis.clone().filter(|s| !s.trim().is_empty()),
            chapter_title: chapter.title.clone(),
            chapter_summary: chapter.summary.clone(),
        })
    }

    fn render(&self) -> String {
        let mut out = format!("Project: {}\n", self.project_title);
        if let Some(synopsis) = &self.synopsis {
            out.push_str(&format!("Synopsis: {}\n", synopsis.trim()));
        }
        out.push_str(&format!("Chapter: {}\n", self.chapter_title));
        if !self.chapter_summary.trim().is_empty() {
            out.push_str(&format!("Chapter summary: {}\n", self.chapter_summary.trim()));
        }
        out
    }
}

pub fn suggestion_prompt(kind: SuggestionType, selection: &str, context: &ChapterContext) -> String {
    format!(
        "You are assisting a fiction author.\n{context}\nTask: {instruction}\n\n\
         Selected passage:\n\"\"\"\n{selection}\n\"\"\"\n\n\
         Offer up to three alternatives. Start each one with a heading line of the form\n\
         ## Suggestion N: <short title>\n\
         followed by the replacement text only.",
        context = context.render(),
        instruction = kind.instruction(),
    )
}

pub fn critique_prompt(draft: &str, context: &ChapterContext) -> String {
    format!(
        "You are an exacting fiction editor.\n{context}\n\
         Critique the chapter draft below. Reply with a JSON object:\n\
         {{\"summary\": string, \"weaknesses\": [{{\"aspect\": string, \"score\": number (1-10), \
         \"problem\": string, \"solutions\": [string]}}]}}\n\n\
         Draft:\n\"\"\"\n{draft}\n\"\"\"",
        context = context.render(),
    )
}

pub fn revision_prompt(capped_draft: &str, critique: &Critique, context: &ChapterContext) -> String {
    format!(
        "You are revising a fiction chapter using an editor's critique.\n{context}\n\
         Critique:\n{critique}\n\n\
         Draft:\n\"\"\"\n{capped_draft}\n\"\"\"\n\n\
         Rewrite the draft to fix the weaknesses while keeping the author's voice. Reply with a JSON object:\n\
         {{\"revisedText\": string, \"improvementSummary\": string, \"changes\": [string]}}",
        context = context.render(),
        critique = critique.render(),
    )
}

/// Whole-project prompt asking for every chapter at once.
pub fn batch_prompt(project: &Project) -> String {
    let mut out = format!(
        "You are drafting a complete work of fiction titled \"{}\".\n",
        project.title
    );
    if let Some(description) = project.description.as_deref().filter(|d| !d.trim().is_empty()) {
        out.push_str(&format!("Description: {}\n", description.trim()));
    }
    if let Some(synopsis) = project.synopsis.as_deref().filter(|s| !s.trim().is_empty()) {
        out.push_str(&format!("Synopsis: {}\n", synopsis.trim()));
    }
    if !project.characters.is_empty() {
        out.push_str("\nCharacters:\n");
        for character in &project.characters {
            out.push_str(&format!("- {} ({})", character.name, character.role));
            if !character.description.trim().is_empty() {
                out.push_str(&format!(": {}", character.description.trim()));
            }
            out.push('\n');
        }
    }
    out.push_str("\nPlot\n");
    out.push_str(&project.plot.describe());
    out.push_str("\nChapters:\n");
    for (index, chapter) in project.chapters.iter().enumerate() {
        out.push_str(&format!("{}. {}", index + 1, chapter.title));
        if !chapter.summary.trim().is_empty() {
            out.push_str(&format!(": {}", chapter.summary.trim()));
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "\nWrite all {} chapters in order. Begin each chapter with a heading line of the form\n\
         ## Chapter N: <title>\nand write nothing but the chapters.",
        project.chapters.len()
    ));
    out
}
