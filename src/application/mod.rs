// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal:
// train the segmentation model, resuming from the most
// advanced checkpoint if one exists.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination

// The training configuration and end-to-end workflow
pub mod train_use_case;

// The validate → train → checkpoint → validate state machine
pub mod schedule;
