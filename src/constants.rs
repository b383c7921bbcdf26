//! Constants used throughout the pose estimation pipeline

/// Number of key landmarks used for pose solving
pub const NUM_KEY_LANDMARKS: usize = 6;

/// Canonical 3D face model points in the model coordinate frame
/// (millimetres), ordered nose tip, left eye outer corner, left mouth
/// corner, chin, right eye outer corner, right mouth corner.
///
/// The key-landmark index tables below follow the same order, so the nth
/// detected key landmark always corresponds to the nth model point.
pub const FACE_MODEL_POINTS: [[f64; 3]; NUM_KEY_LANDMARKS] = [
    [0.0, -1.126_865, 7.475_604],        // nose tip
    [-4.445_859, 2.663_991, 3.173_422],  // left eye outer corner
    [-2.456_206, -4.342_621, 4.283_884], // left mouth corner
    [0.0, -9.403_378, 4.264_492],        // chin
    [4.445_859, 2.663_991, 3.173_422],   // right eye outer corner
    [2.456_206, -4.342_621, 4.283_884],  // right mouth corner
];

/// Key-landmark indices into a dense face-mesh landmark set
pub const MESH_KEY_INDICES: [usize; NUM_KEY_LANDMARKS] = [1, 33, 61, 199, 263, 291];

/// Key-landmark indices into a standard 68-point alignment landmark set
pub const SPARSE_KEY_INDICES: [usize; NUM_KEY_LANDMARKS] = [30, 36, 48, 8, 45, 54];

/// Focal length of an uncalibrated camera, as a fraction of frame height
pub const FOCAL_LENGTH_FACTOR: f64 = 1.28;

/// Frame dimensions assumed by a default-constructed camera
pub const DEFAULT_FRAME_WIDTH: u32 = 1920;
pub const DEFAULT_FRAME_HEIGHT: u32 = 1080;

/// Checkerboard detections that must be exceeded before intrinsics are fitted
pub const MIN_CALIBRATION_DETECTIONS: usize = 50;

/// Default Butterworth low-pass design
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 4000.0;
pub const DEFAULT_CUTOFF_HZ: f64 = 160.0;
pub const DEFAULT_FILTER_ORDER: usize = 4;

/// Default smoothing window of the coarse backend: past frames kept and
/// future frames awaited around the emitted centre frame
pub const DEFAULT_SMOOTHING_PRE: usize = 5;
pub const DEFAULT_SMOOTHING_NEXT: usize = 5;
