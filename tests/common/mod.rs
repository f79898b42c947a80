use serde_json::{Value, json};

/// Under-five mortality for two countries, shaped like the UNICEF warehouse
/// answers: two series, three and two observations.
pub fn unicef_document() -> Value {
    json!({
        "header": {
            "id": "IREF000123",
            "test": false,
            "prepared": "2024-05-02T10:00:00",
            "sender": {"id": "UNICEF"}
        },
        "dataSets": [{
            "action": "Information",
            "series": {
                "0:0:0": {
                    "attributes": [0],
                    "observations": {
                        "0": [3.1, 0],
                        "1": [2.9, 0],
                        "2": [2.7, 1]
                    }
                },
                "1:0:0": {
                    "attributes": [0],
                    "observations": {
                        "1": ["23.9", 0],
                        "2": ["23.4", 1]
                    }
                }
            }
        }],
        "structure": {
            "name": "Global dataflow",
            "dimensions": {
                "dataSet": [],
                "series": [
                    {"id": "REF_AREA", "name": "Geographic area", "keyPosition": 0, "values": [
                        {"id": "CZE", "name": "Czechia"},
                        {"id": "DZA", "name": "Algeria"}
                    ]},
                    {"id": "INDICATOR", "name": "Indicator", "keyPosition": 1, "values": [
                        {"id": "CME_MRM0", "name": "Neonatal mortality rate"}
                    ]},
                    {"id": "SEX", "name": "Sex", "keyPosition": 2, "values": [
                        {"id": "_T", "name": "Total"}
                    ]}
                ],
                "observation": [
                    {"id": "TIME_PERIOD", "name": "TIME_PERIOD", "role": "time", "values": [
                        {"id": "2018", "name": "2018"},
                        {"id": "2019", "name": "2019"},
                        {"id": "2020", "name": "2020"}
                    ]}
                ]
            },
            "attributes": {
                "dataSet": [],
                "series": [
                    {"id": "UNIT_MEASURE", "name": "Unit of measure", "values": [
                        {"id": "D_PER_1000_B", "name": "Deaths per 1000 live births"}
                    ]}
                ],
                "observation": [
                    {"id": "OBS_STATUS", "name": "Observation Status", "values": [
                        {"id": "A", "name": "Normal"},
                        {"id": "E", "name": "Estimated value"}
                    ]}
                ]
            }
        }
    })
}
