pub mod extraction;
pub mod structuring;
pub mod insights; // Health insights + medication recommendations
pub mod processor; // End-to-end diagnostic insight orchestration
