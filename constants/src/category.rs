/// Display style for one annotation category.
pub struct CategoryInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub color: [f32; 3],
}

pub const CATEGORY_MAP: &[CategoryInfo] = &[
    CategoryInfo {
        id: "car",
        label: "Car",
        color: [0.0, 1.0, 0.0],
    },
    CategoryInfo {
        id: "truck",
        label: "Truck",
        color: [0.0, 0.6, 1.0],
    },
    CategoryInfo {
        id: "bus",
        label: "Bus",
        color: [0.2, 0.4, 1.0],
    },
    CategoryInfo {
        id: "pedestrian",
        label: "Pedestrian",
        color: [1.0, 0.4, 0.0],
    },
    CategoryInfo {
        id: "cyclist",
        label: "Cyclist",
        color: [1.0, 0.0, 1.0],
    },
    CategoryInfo {
        id: "unknown",
        label: "Unknown",
        color: [0.7, 0.7, 0.7],
    },
];

pub fn get_category(id: &str) -> Option<&'static CategoryInfo> {
    CATEGORY_MAP.iter().find(|c| c.id == id)
}

pub fn get_category_label(id: &str) -> String {
    get_category(id).map_or("unknown", |c| c.label).to_string()
}
